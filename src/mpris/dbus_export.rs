//! Session bus export of the MPRIS object.
//!
//! The blocking `dbus` connection lives on its own thread. It answers property
//! reads from the latest published [`PlayerView`], forwards method calls and
//! property writes to the engine, and emits the signals the engine asks for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dbus::arg::{ArgType, PropMap, RefArg, Variant};
use dbus::blocking::stdintf::org_freedesktop_dbus::{PropertiesPropertiesChanged, RequestNameReply};
use dbus::blocking::Connection;
use dbus::channel::{MatchingReceiver, Sender as _};
use dbus::message::{MatchRule, SignalArgs};
use dbus::strings::BusName;
use dbus::{Message, MethodErr, Path};
use log::{debug, error, info, trace, warn};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::bridge::BridgeHandle;
use crate::data::{Metadata, PlayerView};
use super::surface::{self, ChangeTracker, MethodArgs, PropValue, SurfaceError, PLAYER_INTERFACE, ROOT_INTERFACE};
use super::{bus_name, ExportSink, OBJECT_PATH};

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

/// How long one `process` call may block before pending signals are flushed
const PROCESS_TIMEOUT: Duration = Duration::from_millis(100);

const INTROSPECTION_XML: &str = r#"<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
 "http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node>
  <interface name="org.freedesktop.DBus.Introspectable">
    <method name="Introspect">
      <arg name="xml_data" type="s" direction="out"/>
    </method>
  </interface>
  <interface name="org.freedesktop.DBus.Properties">
    <method name="Get">
      <arg name="interface_name" type="s" direction="in"/>
      <arg name="property_name" type="s" direction="in"/>
      <arg name="value" type="v" direction="out"/>
    </method>
    <method name="GetAll">
      <arg name="interface_name" type="s" direction="in"/>
      <arg name="properties" type="a{sv}" direction="out"/>
    </method>
    <method name="Set">
      <arg name="interface_name" type="s" direction="in"/>
      <arg name="property_name" type="s" direction="in"/>
      <arg name="value" type="v" direction="in"/>
    </method>
    <signal name="PropertiesChanged">
      <arg name="interface_name" type="s"/>
      <arg name="changed_properties" type="a{sv}"/>
      <arg name="invalidated_properties" type="as"/>
    </signal>
  </interface>
  <interface name="org.mpris.MediaPlayer2">
    <method name="Raise"/>
    <method name="Quit"/>
    <property name="CanQuit" type="b" access="read"/>
    <property name="CanRaise" type="b" access="read"/>
    <property name="HasTrackList" type="b" access="read"/>
    <property name="Identity" type="s" access="read"/>
    <property name="DesktopEntry" type="s" access="read"/>
    <property name="SupportedUriSchemes" type="as" access="read"/>
    <property name="SupportedMimeTypes" type="as" access="read"/>
  </interface>
  <interface name="org.mpris.MediaPlayer2.Player">
    <method name="Next"/>
    <method name="Previous"/>
    <method name="Pause"/>
    <method name="PlayPause"/>
    <method name="Stop"/>
    <method name="Play"/>
    <method name="Seek">
      <arg name="Offset" type="x" direction="in"/>
    </method>
    <method name="SetPosition">
      <arg name="TrackId" type="o" direction="in"/>
      <arg name="Position" type="x" direction="in"/>
    </method>
    <method name="OpenUri">
      <arg name="Uri" type="s" direction="in"/>
    </method>
    <signal name="Seeked">
      <arg name="Position" type="x"/>
    </signal>
    <property name="PlaybackStatus" type="s" access="read"/>
    <property name="LoopStatus" type="s" access="readwrite"/>
    <property name="Rate" type="d" access="readwrite"/>
    <property name="Shuffle" type="b" access="readwrite"/>
    <property name="Metadata" type="a{sv}" access="read"/>
    <property name="Volume" type="d" access="readwrite"/>
    <property name="Position" type="x" access="read"/>
    <property name="MinimumRate" type="d" access="read"/>
    <property name="MaximumRate" type="d" access="read"/>
    <property name="CanGoNext" type="b" access="read"/>
    <property name="CanGoPrevious" type="b" access="read"/>
    <property name="CanPlay" type="b" access="read"/>
    <property name="CanPause" type="b" access="read"/>
    <property name="CanSeek" type="b" access="read"/>
    <property name="CanControl" type="b" access="read"/>
  </interface>
</node>"#;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("D-Bus error: {0}")]
    Dbus(#[from] dbus::Error),

    #[error("Invalid bus name {0}")]
    InvalidName(String),

    #[error("Bus name {0} is already owned by another process")]
    NameTaken(String),

    #[error("Failed to start D-Bus thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Work for the bus thread
enum Outbound {
    /// The view changed, announce whatever differs
    Changed,
    Seeked(i64),
}

/// Exports the engine's state as `org.mpris.MediaPlayer2.<suffix>`
pub struct DbusExport {
    views: watch::Sender<PlayerView>,
    outbound: Sender<Outbound>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DbusExport {
    /// Connect to the session bus, claim the name and start serving.
    ///
    /// Calls and property writes are forwarded to `engine`.
    pub fn start(suffix: &str, initial: PlayerView, engine: BridgeHandle) -> Result<Self, ExportError> {
        let name = bus_name(suffix);
        let bus_name = BusName::new(name.clone()).map_err(|_| ExportError::InvalidName(name.clone()))?;

        let conn = Connection::new_session()?;
        match conn.request_name(bus_name.clone(), false, true, true)? {
            RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => {}
            _ => return Err(ExportError::NameTaken(name)),
        }
        info!("Exporting MPRIS player as {}", name);

        let (views, view_rx) = watch::channel(initial);
        let (outbound, outbound_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let requests = view_rx.clone();
        conn.start_receive(MatchRule::new_method_call(), Box::new(move |msg, conn| {
            let reply = handle_message(&msg, &requests, &engine);
            if conn.send(reply).is_err() {
                warn!("Failed to send D-Bus reply");
            }
            true
        }));

        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("mpris-dbus".to_string())
            .spawn(move || serve(conn, bus_name, view_rx, outbound_rx, thread_stop))?;

        Ok(Self {
            views,
            outbound,
            stop,
            thread: Some(thread),
        })
    }
}

impl ExportSink for DbusExport {
    fn publish(&mut self, view: &PlayerView) {
        self.views.send_replace(view.clone());
        let _ = self.outbound.send(Outbound::Changed);
    }

    fn emit_seeked(&mut self, position_us: i64) {
        let _ = self.outbound.send(Outbound::Seeked(position_us));
    }

    fn release(&mut self) {
        let thread = match self.thread.take() {
            Some(thread) => thread,
            None => return,
        };
        self.stop.store(true, Ordering::Relaxed);
        if thread.join().is_err() {
            error!("D-Bus thread panicked");
        }
    }
}

impl Drop for DbusExport {
    fn drop(&mut self) {
        self.release();
    }
}

/// Bus thread: dispatch incoming calls and flush outgoing signals until stopped
fn serve(
    conn: Connection,
    name: BusName<'static>,
    views: watch::Receiver<PlayerView>,
    outbound: Receiver<Outbound>,
    stop: Arc<AtomicBool>,
) {
    let path = Path::from(OBJECT_PATH);
    let mut tracker = ChangeTracker::new(&views.borrow(), Instant::now());

    while !stop.load(Ordering::Relaxed) {
        if let Err(err) = conn.process(PROCESS_TIMEOUT) {
            error!("D-Bus connection failed: {}", err);
            break;
        }

        loop {
            match outbound.try_recv() {
                Ok(Outbound::Changed) => {
                    let view = views.borrow().clone();
                    for (interface, changed) in tracker.changes(&view, Instant::now()) {
                        trace!("PropertiesChanged {} {:?}", interface, changed.iter().map(|(n, _)| *n).collect::<Vec<_>>());
                        let signal = PropertiesPropertiesChanged {
                            interface_name: interface.to_string(),
                            changed_properties: changed.into_iter()
                                .map(|(name, value)| (name.to_string(), to_variant(value)))
                                .collect(),
                            invalidated_properties: Vec::new(),
                        };
                        if conn.send(signal.to_emit_message(&path)).is_err() {
                            warn!("Failed to emit PropertiesChanged");
                        }
                    }
                }
                Ok(Outbound::Seeked(position)) => {
                    debug!("Seeked {}", position);
                    match Message::new_signal(OBJECT_PATH, PLAYER_INTERFACE, "Seeked") {
                        Ok(signal) => {
                            if conn.send(signal.append1(position)).is_err() {
                                warn!("Failed to emit Seeked");
                            }
                        }
                        Err(err) => warn!("Failed to build Seeked signal: {}", err),
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    if let Err(err) = conn.release_name(name.clone()) {
        warn!("Failed to release bus name {}: {}", name, err);
    }
    debug!("D-Bus thread stopped");
}

fn handle_message(msg: &Message, views: &watch::Receiver<PlayerView>, engine: &BridgeHandle) -> Message {
    let (interface, member) = match (msg.interface(), msg.member()) {
        (Some(interface), Some(member)) => (interface.to_string(), member.to_string()),
        _ => return MethodErr::failed(&"Missing interface or member").to_message(msg),
    };
    if msg.path().map(|p| &*p != OBJECT_PATH).unwrap_or(true) {
        return MethodErr::failed(&"No such object").to_message(msg);
    }
    trace!("D-Bus call {}.{}", interface, member);

    let result = match interface.as_str() {
        PROPERTIES_INTERFACE => handle_properties(msg, &member, views, engine),
        INTROSPECTABLE_INTERFACE if member == "Introspect" => Ok(msg.method_return().append1(INTROSPECTION_XML)),
        ROOT_INTERFACE | PLAYER_INTERFACE => handle_method(msg, &interface, &member, engine),
        _ => Err(MethodErr::no_interface(&interface)),
    };
    result.unwrap_or_else(|err| err.to_message(msg))
}

fn handle_properties(
    msg: &Message,
    member: &str,
    views: &watch::Receiver<PlayerView>,
    engine: &BridgeHandle,
) -> Result<Message, MethodErr> {
    match member {
        "Get" => {
            let (interface, name): (&str, &str) = msg.read2()?;
            let value = surface::get_property(&views.borrow(), interface, name, Instant::now())
                .map_err(to_method_err)?;
            Ok(msg.method_return().append1(to_variant(value)))
        }
        "GetAll" => {
            let interface: &str = msg.read1()?;
            let properties: PropMap = surface::get_all(&views.borrow(), interface, Instant::now())
                .into_iter()
                .map(|(name, value)| (name.to_string(), to_variant(value)))
                .collect();
            Ok(msg.method_return().append1(properties))
        }
        "Set" => {
            let (interface, name, value): (&str, &str, Variant<Box<dyn RefArg>>) = msg.read3()?;
            let decoded = from_ref_arg(&*value.0).ok_or_else(|| MethodErr::invalid_arg(&name))?;
            let call = surface::set_property(interface, name, &decoded).map_err(to_method_err)?;
            debug!("Property write {}.{} -> {}", interface, name, call);
            engine.call(call);
            Ok(msg.method_return())
        }
        _ => Err(MethodErr::no_method(&member)),
    }
}

fn handle_method(msg: &Message, interface: &str, member: &str, engine: &BridgeHandle) -> Result<Message, MethodErr> {
    let entry = surface::find_method(interface, member).map_err(to_method_err)?;
    let args = match entry.signature {
        "" => MethodArgs::None,
        "x" => MethodArgs::Offset(msg.read1()?),
        "ox" => {
            let (track_id, position_us): (Path, i64) = msg.read2()?;
            MethodArgs::Position { track_id: track_id.to_string(), position_us }
        }
        "s" => MethodArgs::Uri(msg.read1::<&str>()?.to_string()),
        other => return Err(MethodErr::failed(&format!("Unsupported signature {}", other))),
    };

    if let Some(call) = (entry.handler)(args) {
        debug!("D-Bus {} -> {}", member, call);
        engine.call(call);
    }
    Ok(msg.method_return())
}

fn to_method_err(err: SurfaceError) -> MethodErr {
    match err {
        SurfaceError::UnknownProperty(_, name) => MethodErr::no_property(&name),
        SurfaceError::ReadOnly(name) => MethodErr::ro_property(&name),
        SurfaceError::InvalidValue(name, _) => MethodErr::invalid_arg(&name),
        SurfaceError::UnknownMethod(_, name) => MethodErr::no_method(&name),
    }
}

/// Decode a written property value
fn from_ref_arg(value: &dyn RefArg) -> Option<PropValue> {
    match value.arg_type() {
        ArgType::Boolean => value.as_u64().map(|v| PropValue::Bool(v != 0)),
        ArgType::Double => value.as_f64().map(PropValue::Double),
        ArgType::Int64 => value.as_i64().map(PropValue::Int64),
        ArgType::String => value.as_str().map(|s| PropValue::Str(s.to_string())),
        _ => None,
    }
}

fn to_variant(value: PropValue) -> Variant<Box<dyn RefArg>> {
    match value {
        PropValue::Bool(v) => Variant(Box::new(v)),
        PropValue::Double(v) => Variant(Box::new(v)),
        PropValue::Int64(v) => Variant(Box::new(v)),
        PropValue::Str(v) => Variant(Box::new(v)),
        PropValue::StrList(v) => Variant(Box::new(v)),
        PropValue::Metadata(metadata) => Variant(Box::new(metadata_map(&metadata))),
    }
}

/// `a{sv}` metadata; optional entries only when known
fn metadata_map(metadata: &Metadata) -> PropMap {
    let mut map = PropMap::new();
    let track_id = Path::new(metadata.track_id.as_str().to_string())
        .unwrap_or_else(|_| Path::from(crate::data::metadata::NO_TRACK_ID));
    map.insert("mpris:trackid".to_string(), Variant(Box::new(track_id)));
    if let Some(title) = &metadata.title {
        map.insert("xesam:title".to_string(), Variant(Box::new(title.clone())));
    }
    if !metadata.artists.is_empty() {
        map.insert("xesam:artist".to_string(), Variant(Box::new(metadata.artists.clone())));
    }
    if let Some(album) = &metadata.album {
        map.insert("xesam:album".to_string(), Variant(Box::new(album.clone())));
    }
    if let Some(art_url) = &metadata.art_url {
        map.insert("mpris:artUrl".to_string(), Variant(Box::new(art_url.clone())));
    }
    if let Some(length) = metadata.length_us {
        map.insert("mpris:length".to_string(), Variant(Box::new(length)));
    }
    map
}
