/// Clients for the media servers the bridge can mirror
pub mod lms;
