/// LMS (Lyrion Music Server) client module
pub mod artwork;
pub mod jsonrps;
pub mod status;
pub mod transport;

// Re-export main components for easier access
pub use artwork::{resolve_artwork_url, ArtworkOptions};
pub use jsonrps::{status_request, LmsRpcClient, LmsRpcError, PlayerEntry};
pub use status::{ArtworkId, RawStatus, Track};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
