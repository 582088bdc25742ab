pub mod events;
pub mod handshake;
pub mod lifecycle;
pub mod replay;


pub use events::run_event_writer;
pub use handshake::HandshakeCorrelator;
pub use lifecycle::ConnectionLifecycleTracker;
pub use replay::run_replay_monitor;
