//! Duplex pump workers
//!
//! An outbound worker reads a local source and sends DATA (or ERR) frames;
//! an inbound worker parses frames from the transport and hands them to a
//! [`FrameSink`]. Both are plain blocking loops meant to run on their own
//! thread via [`SessionController::spawn`](crate::session::SessionController::spawn).

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pt_protocol::{Flow, FrameSender, Message, Parser, ProtocolError, WindowSize, MAX_PAYLOAD_SIZE};

use crate::error::PumpError;
use crate::session::SessionContext;

/// Frame sender shared by the outbound workers of one transport
pub type SharedSender<W> = Arc<Mutex<FrameSender<W>>>;

/// Wrap a sender for sharing between workers
pub fn shared_sender<W: Write>(sender: FrameSender<W>) -> SharedSender<W> {
    Arc::new(Mutex::new(sender))
}

/// Frame command an outbound worker tags its chunks with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputChannel {
    #[default]
    Data,
    Stderr,
}

/// Source of window size changes to announce
pub trait WindowSource: Send {
    /// The new size if a change is pending, clearing the pending state
    fn poll_resize(&mut self) -> Result<Option<WindowSize>, PumpError>;
}

/// Decides which of several producers sends the EOF frame
#[derive(Debug)]
pub struct EofGate {
    remaining: AtomicUsize,
    enabled: bool,
}

impl EofGate {
    /// Gate shared by `producers` outbound workers; the last one to finish sends EOF
    pub fn new(producers: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(producers),
            enabled: true,
        })
    }

    /// Gate that never sends EOF
    pub fn disabled() -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(1),
            enabled: false,
        })
    }

    /// Record that one producer reached end of input.
    ///
    /// Returns true for exactly one caller: the last producer, when enabled.
    pub fn finish(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.enabled && previous == Ok(1)
    }
}

/// Settings for one outbound worker
pub struct OutboundPump<R, W> {
    source: R,
    sender: SharedSender<W>,
    channel: OutputChannel,
    window: Option<Box<dyn WindowSource>>,
    stop_on_peer_eof: bool,
    eof_gate: Arc<EofGate>,
}

impl<R: Read, W: Write> OutboundPump<R, W> {
    /// Pump `source` into DATA frames, sending EOF at end of input
    pub fn new(source: R, sender: SharedSender<W>) -> Self {
        Self {
            source,
            sender,
            channel: OutputChannel::Data,
            window: None,
            stop_on_peer_eof: false,
            eof_gate: EofGate::new(1),
        }
    }

    /// Tag chunks with a different command
    pub fn channel(mut self, channel: OutputChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Announce window size changes from `window`
    pub fn window(mut self, window: Box<dyn WindowSource>) -> Self {
        self.window = Some(window);
        self
    }

    /// Stop reading once the peer has signaled end of input
    pub fn stop_on_peer_eof(mut self, stop: bool) -> Self {
        self.stop_on_peer_eof = stop;
        self
    }

    /// Share the EOF decision with other producers
    pub fn eof_gate(mut self, gate: Arc<EofGate>) -> Self {
        self.eof_gate = gate;
        self
    }
}

/// Run an outbound worker until local end of input or failure
pub fn pump_outbound<R: Read, W: Write>(
    ctx: &SessionContext,
    pump: OutboundPump<R, W>,
) -> Result<(), PumpError> {
    let OutboundPump {
        mut source,
        sender,
        channel,
        mut window,
        stop_on_peer_eof,
        eof_gate,
    } = pump;

    let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];
    loop {
        if let Some(window) = window.as_mut() {
            if let Some(size) = window.poll_resize()? {
                tracing::debug!("Sending window size [rows:{}][cols:{}]", size.rows, size.cols);
                lock(&sender)?.send_window_size(size)?;
            }
        }

        if stop_on_peer_eof && ctx.peer_eof() {
            tracing::debug!("Peer signaled end of input, stopping {:?} pump", channel);
            return Ok(());
        }

        let n = match source.read(&mut buf) {
            Ok(n) => n,
            // Possibly a resize signal; re-check the flags
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PumpError::Io(e)),
        };

        if n == 0 {
            tracing::debug!("Local {:?} source reached end of input", channel);
            break;
        }

        let mut guard = lock(&sender)?;
        match channel {
            OutputChannel::Data => guard.send_data(&buf[..n])?,
            OutputChannel::Stderr => guard.send_stderr(&buf[..n])?,
        }
    }

    if eof_gate.finish() {
        tracing::debug!("Sending EOF");
        lock(&sender)?.send_eof()?;
    }
    Ok(())
}

fn lock<W>(sender: &SharedSender<W>) -> Result<std::sync::MutexGuard<'_, FrameSender<W>>, PumpError> {
    sender.lock().map_err(|_| PumpError::Poisoned)
}

/// Receiver of decoded inbound frames
pub trait FrameSink {
    /// Primary channel data
    fn data(&mut self, payload: &[u8]) -> Result<(), PumpError>;

    /// Secondary channel data
    fn stderr(&mut self, _payload: &[u8]) -> Result<(), PumpError> {
        Err(ProtocolError::UnexpectedCommand("ERR").into())
    }

    /// Window size change
    fn resize(&mut self, _size: WindowSize) -> Result<(), PumpError> {
        Err(ProtocolError::UnexpectedCommand("WS").into())
    }

    /// The peer sent an EOF frame; no more input will follow
    fn eof(&mut self) -> Result<(), PumpError> {
        Ok(())
    }

    /// The transport closed without an EOF frame
    fn hangup(&mut self) -> Result<(), PumpError> {
        Ok(())
    }
}

/// Sink writing DATA to one stream and ERR to another. Rejects WS.
#[derive(Debug)]
pub struct StreamSink<O, E> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> StreamSink<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Unwrap both streams
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> FrameSink for StreamSink<O, E> {
    fn data(&mut self, payload: &[u8]) -> Result<(), PumpError> {
        self.out.write_all(payload)?;
        self.out.flush()?;
        Ok(())
    }

    fn stderr(&mut self, payload: &[u8]) -> Result<(), PumpError> {
        self.err.write_all(payload)?;
        self.err.flush()?;
        Ok(())
    }
}

/// Run an inbound worker until EOF (frame or transport) or failure.
///
/// An EOF frame sets the session's end-of-input flag and is passed on with
/// [`FrameSink::eof`]; a transport that just closes is passed on with
/// [`FrameSink::hangup`]. The sink is dropped on return, which closes
/// whatever it writes to.
pub fn pump_inbound<R: Read, S: FrameSink>(
    ctx: &SessionContext,
    mut transport: R,
    mut sink: S,
) -> Result<(), PumpError> {
    let mut parser = Parser::new();
    let mut sink_error = None;
    let mut peer_eof = false;

    while !parser.is_eof() {
        parser.feed(&mut transport, |message| {
            let result = match message {
                Message::Data(payload) => sink.data(&payload),
                Message::Stderr(payload) => sink.stderr(&payload),
                Message::WindowSize(size) => sink.resize(size),
                Message::Eof => {
                    peer_eof = true;
                    return Ok(Flow::Stop);
                }
            };
            match result {
                Ok(()) => Ok(Flow::Continue),
                Err(PumpError::Protocol(e)) => Err(e),
                Err(e) => {
                    sink_error = Some(e);
                    Ok(Flow::Stop)
                }
            }
        })?;

        if let Some(e) = sink_error.take() {
            return Err(e);
        }
        if peer_eof {
            tracing::debug!("EOF frame received");
            ctx.set_peer_eof();
            return sink.eof();
        }
    }

    tracing::debug!("Transport reached end of stream");
    sink.hangup()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionController;
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    fn frames(build: impl FnOnce(&mut FrameSender<Vec<u8>>)) -> Vec<u8> {
        let mut sender = FrameSender::new(Vec::new());
        build(&mut sender);
        sender.into_inner()
    }

    fn decode_all(bytes: Vec<u8>) -> Vec<Message> {
        let mut parser = Parser::new();
        let mut reader = Cursor::new(bytes);
        let mut out = Vec::new();
        while !parser.is_eof() {
            parser
                .feed(&mut reader, |m| {
                    out.push(m);
                    Ok(Flow::Continue)
                })
                .unwrap();
        }
        out
    }

    fn take_output(sender: SharedSender<Vec<u8>>) -> Vec<u8> {
        Arc::try_unwrap(sender).unwrap().into_inner().unwrap().into_inner()
    }

    /// Source that yields scripted read results
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
            }
        }
    }

    struct Resizes(VecDeque<Option<WindowSize>>);

    impl WindowSource for Resizes {
        fn poll_resize(&mut self) -> Result<Option<WindowSize>, PumpError> {
            Ok(self.0.pop_front().flatten())
        }
    }

    #[derive(Default)]
    struct Recorder {
        data: Vec<u8>,
        sizes: Vec<WindowSize>,
        eofs: usize,
        hangups: usize,
    }

    impl FrameSink for Recorder {
        fn data(&mut self, payload: &[u8]) -> Result<(), PumpError> {
            self.data.extend_from_slice(payload);
            Ok(())
        }

        fn resize(&mut self, size: WindowSize) -> Result<(), PumpError> {
            self.sizes.push(size);
            Ok(())
        }

        fn eof(&mut self) -> Result<(), PumpError> {
            self.eofs += 1;
            Ok(())
        }

        fn hangup(&mut self) -> Result<(), PumpError> {
            self.hangups += 1;
            Ok(())
        }
    }

    impl FrameSink for &mut Recorder {
        fn data(&mut self, payload: &[u8]) -> Result<(), PumpError> {
            (**self).data(payload)
        }

        fn resize(&mut self, size: WindowSize) -> Result<(), PumpError> {
            (**self).resize(size)
        }

        fn eof(&mut self) -> Result<(), PumpError> {
            (**self).eof()
        }

        fn hangup(&mut self) -> Result<(), PumpError> {
            (**self).hangup()
        }
    }

    #[test]
    fn test_eof_gate_last_producer_sends() {
        let gate = EofGate::new(2);
        assert!(!gate.finish());
        assert!(gate.finish());
        assert!(!gate.finish());

        let disabled = EofGate::disabled();
        assert!(!disabled.finish());
    }

    #[test]
    fn test_outbound_sends_window_size_before_data() {
        let ctx = SessionController::new().context();
        let sender = shared_sender(FrameSender::new(Vec::new()));
        let source = Cursor::new(b"echo hi\n".to_vec());
        let window = Resizes(VecDeque::from([Some(WindowSize::new(24, 80))]));

        pump_outbound(
            &ctx,
            OutboundPump::new(source, sender.clone()).window(Box::new(window)),
        )
        .unwrap();

        let messages = decode_all(take_output(sender));
        assert_eq!(
            messages,
            vec![
                Message::WindowSize(WindowSize::new(24, 80)),
                Message::Data(bytes::Bytes::from_static(b"echo hi\n")),
                Message::Eof,
            ]
        );
    }

    #[test]
    fn test_outbound_interrupted_read_rechecks_resize() {
        let ctx = SessionController::new().context();
        let sender = shared_sender(FrameSender::new(Vec::new()));
        let source = Scripted(VecDeque::from([
            Ok(b"a".to_vec()),
            Err(io::Error::from(ErrorKind::Interrupted)),
            Ok(b"b".to_vec()),
        ]));
        let window = Resizes(VecDeque::from([None, None, Some(WindowSize::new(50, 120))]));

        pump_outbound(
            &ctx,
            OutboundPump::new(source, sender.clone()).window(Box::new(window)),
        )
        .unwrap();

        let messages = decode_all(take_output(sender));
        assert_eq!(messages[0], Message::Data(bytes::Bytes::from_static(b"a")));
        assert_eq!(messages[1], Message::WindowSize(WindowSize::new(50, 120)));
        assert_eq!(messages[2], Message::Data(bytes::Bytes::from_static(b"b")));
        assert_eq!(messages[3], Message::Eof);
    }

    #[test]
    fn test_outbound_stderr_channel_without_eof() {
        let ctx = SessionController::new().context();
        let sender = shared_sender(FrameSender::new(Vec::new()));
        let gate = EofGate::new(2);

        pump_outbound(
            &ctx,
            OutboundPump::new(Cursor::new(b"oops".to_vec()), sender.clone())
                .channel(OutputChannel::Stderr)
                .eof_gate(gate.clone()),
        )
        .unwrap();

        let messages = decode_all(take_output(sender));
        assert_eq!(messages, vec![Message::Stderr(bytes::Bytes::from_static(b"oops"))]);
        assert!(gate.finish());
    }

    #[test]
    fn test_outbound_stops_on_peer_eof() {
        let ctx = SessionController::new().context();
        ctx.set_peer_eof();
        let sender = shared_sender(FrameSender::new(Vec::new()));

        pump_outbound(
            &ctx,
            OutboundPump::new(Cursor::new(b"unread".to_vec()), sender.clone())
                .stop_on_peer_eof(true),
        )
        .unwrap();

        assert!(take_output(sender).is_empty());
    }

    #[test]
    fn test_outbound_read_error_is_fatal() {
        let ctx = SessionController::new().context();
        let sender = shared_sender(FrameSender::new(Vec::new()));
        let source = Scripted(VecDeque::from([Err(io::Error::from(ErrorKind::PermissionDenied))]));

        let result = pump_outbound(&ctx, OutboundPump::new(source, sender));
        assert!(matches!(result, Err(PumpError::Io(_))));
    }

    #[test]
    fn test_outbound_splits_large_reads() {
        let ctx = SessionController::new().context();
        let sender = shared_sender(FrameSender::new(Vec::new()));
        let input = vec![7u8; MAX_PAYLOAD_SIZE + 10];

        pump_outbound(&ctx, OutboundPump::new(Cursor::new(input), sender.clone())).unwrap();

        let messages = decode_all(take_output(sender));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].payload_len(), MAX_PAYLOAD_SIZE);
        assert_eq!(messages[1].payload_len(), 10);
    }

    #[test]
    fn test_inbound_dispatches_until_eof_frame() {
        let controller = SessionController::new();
        let ctx = controller.context();
        let bytes = frames(|s| {
            s.send_window_size(WindowSize::new(40, 100)).unwrap();
            s.send_data(b"hello ").unwrap();
            s.send_data(b"world").unwrap();
            s.send_eof().unwrap();
            s.send_data(b"after eof").unwrap();
        });

        let mut recorder = Recorder::default();
        pump_inbound(&ctx, Cursor::new(bytes), &mut recorder).unwrap();

        assert_eq!(recorder.data, b"hello world");
        assert_eq!(recorder.sizes, vec![WindowSize::new(40, 100)]);
        assert_eq!((recorder.eofs, recorder.hangups), (1, 0));
        assert!(ctx.peer_eof());
    }

    #[test]
    fn test_inbound_transport_eof_is_clean() {
        let ctx = SessionController::new().context();
        let bytes = frames(|s| s.send_data(b"partial session").unwrap());

        let mut recorder = Recorder::default();
        pump_inbound(&ctx, Cursor::new(bytes), &mut recorder).unwrap();
        assert_eq!(recorder.data, b"partial session");
        assert_eq!((recorder.eofs, recorder.hangups), (0, 1));
        assert!(!ctx.peer_eof());
    }

    #[test]
    fn test_inbound_eof_hook_failure_is_reported() {
        struct Stuck;
        impl FrameSink for Stuck {
            fn data(&mut self, _payload: &[u8]) -> Result<(), PumpError> {
                Ok(())
            }

            fn eof(&mut self) -> Result<(), PumpError> {
                Err(PumpError::Io(io::Error::from(ErrorKind::BrokenPipe)))
            }
        }

        let ctx = SessionController::new().context();
        let bytes = frames(|s| s.send_eof().unwrap());
        let result = pump_inbound(&ctx, Cursor::new(bytes), Stuck);
        assert!(matches!(result, Err(PumpError::Io(_))));
        assert!(ctx.peer_eof());
    }

    #[test]
    fn test_stream_sink_rejects_window_size() {
        let ctx = SessionController::new().context();
        let bytes = frames(|s| {
            s.send_data(b"x").unwrap();
            s.send_stderr(b"y").unwrap();
            s.send_window_size(WindowSize::default()).unwrap();
        });

        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = pump_inbound(&ctx, Cursor::new(bytes), StreamSink::new(&mut out, &mut err));

        assert!(matches!(
            result,
            Err(PumpError::Protocol(ProtocolError::UnexpectedCommand("WS")))
        ));
        assert_eq!(out, b"x");
        assert_eq!(err, b"y");
    }

    #[test]
    fn test_inbound_sequence_tampering() {
        let ctx = SessionController::new().context();
        let mut bytes = frames(|s| {
            s.send_data(b"one").unwrap();
            s.send_data(b"two").unwrap();
        });
        // Second frame header starts after the first 7-byte frame
        bytes[7 + 3] = 9;

        let mut recorder = Recorder::default();
        let result = pump_inbound(&ctx, Cursor::new(bytes), &mut recorder);
        assert!(matches!(
            result,
            Err(PumpError::Protocol(ProtocolError::SequenceMismatch {
                expected: 1,
                actual: 9
            }))
        ));
        assert_eq!(recorder.data, b"one");
    }

    #[test]
    fn test_inbound_sink_io_error() {
        struct Broken;
        impl FrameSink for Broken {
            fn data(&mut self, _payload: &[u8]) -> Result<(), PumpError> {
                Err(PumpError::Io(io::Error::from(ErrorKind::BrokenPipe)))
            }
        }

        let ctx = SessionController::new().context();
        let bytes = frames(|s| s.send_data(b"lost").unwrap());
        let result = pump_inbound(&ctx, Cursor::new(bytes), Broken);
        assert!(matches!(result, Err(PumpError::Io(_))));
    }
}
