use std::io::{Read, Write};

use tracing::{debug, trace, warn};

use crate::codec::FramedStream;
use crate::config::Config;
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::assembler::{AssembledMessage, MessageAssembler};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;
use crate::protocol::handshake::{validate_origin, HandshakeContext};
use crate::protocol::{validate_utf8, Frame, HandshakeRequest, HandshakeResponse, OpCode};
use crate::uri::WsUri;

/// A WebSocket endpoint driving a blocking byte stream.
///
/// A connection starts `Closed`. The opening handshake is driven explicitly:
/// a client calls [`initiate_handshake`](Self::initiate_handshake) to send
/// the upgrade request and [`accept_handshake`](Self::accept_handshake) to
/// read the response; a server completes the whole exchange in
/// `initiate_handshake`. Once `Open`, messages flow through [`send`](Self::send)
/// and [`read`](Self::read) until [`close`](Self::close) or a received Close
/// ends the session.
///
/// Protocol violations by the peer are fatal: a best-effort Close frame with
/// the matching status is sent, the state becomes `Closed` and the error is
/// returned. A timeout is never fatal.
///
/// ## Example
///
/// ```no_run
/// use std::net::TcpStream;
/// use wsync::{Config, Connection};
///
/// # fn main() -> wsync::Result<()> {
/// let stream = TcpStream::connect("localhost:9001")?;
/// let mut conn = Connection::client(stream, "ws://localhost:9001/chat", Config::client())?;
/// conn.initiate_handshake()?;
/// conn.accept_handshake()?;
///
/// conn.send_text("Hello")?;
/// let reply = conn.read()?;
/// println!("Received: {reply:?}");
/// conn.close_and_wait(wsync::CloseCode::Normal, "done")?;
/// # Ok(())
/// # }
/// ```
pub struct Connection<S> {
    framed: FramedStream<S>,
    config: Config,
    state: ConnectionState,
    assembler: MessageAssembler,
    uri: Option<WsUri>,
    handshake: Option<HandshakeContext>,
    resource: Option<String>,
    protocol: Option<String>,
    extensions: Vec<String>,
}

impl<S> Connection<S> {
    /// Create a client endpoint for `uri`.
    ///
    /// The stream must already be connected to the URI's host; for `wss`
    /// it must already be encrypted.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUri` if `uri` is not a usable `ws`/`wss` URI.
    pub fn client(stream: S, uri: &str, config: Config) -> Result<Self> {
        let uri = WsUri::parse(uri)?;
        let mut conn = Self::new(stream, Role::Client, config);
        conn.resource = Some(uri.resource());
        conn.uri = Some(uri);
        Ok(conn)
    }

    /// Create a server endpoint for an accepted stream.
    #[must_use]
    pub fn server(stream: S, config: Config) -> Self {
        Self::new(stream, Role::Server, config)
    }

    fn new(stream: S, role: Role, config: Config) -> Self {
        Self {
            framed: FramedStream::new(stream, role, &config),
            assembler: MessageAssembler::new(config.limits),
            config,
            state: ConnectionState::Closed,
            uri: None,
            handshake: None,
            resource: None,
            protocol: None,
            extensions: Vec::new(),
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if messages can be sent and received.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.framed.role()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Target URI (client only).
    #[must_use]
    pub fn uri(&self) -> Option<&WsUri> {
        self.uri.as_ref()
    }

    /// Request target: the URI's path and query for a client, the path the
    /// client asked for on a server.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Subprotocol agreed during the handshake, if any.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Extension values the peer sent in the handshake.
    ///
    /// Recorded for inspection only; no extension is ever activated.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn get_ref(&self) -> &S {
        self.framed.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.framed.get_mut()
    }

    /// Consume the connection and return the stream. Buffered unread bytes
    /// are discarded.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(role = %self.role(), from = %self.state, to = %state, "state change");
            self.state = state;
        }
    }

    fn require_open(&self) -> Result<()> {
        if self.state.can_send() {
            Ok(())
        } else {
            Err(Error::NotOpen(self.state))
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Start the opening handshake. Only valid in `Closed`.
    ///
    /// - Client: writes the upgrade request and moves to `Connecting`.
    /// - Server: reads and validates the upgrade request, writes the 101
    ///   response and moves to `Open`. On failure nothing is written and the
    ///   state stays `Closed`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if the connection is not `Closed`
    /// - handshake errors (`InvalidHandshake`, `HandshakeTooLarge`,
    ///   `OriginNotAllowed`, `InvalidHeaderValue`)
    /// - transport errors, including `Error::Timeout`
    pub fn initiate_handshake(&mut self) -> Result<()> {
        if self.state.is_active() {
            return Err(Error::InvalidState(self.state));
        }

        self.assembler.reset();
        self.protocol = None;
        self.extensions.clear();

        match self.role() {
            Role::Client => self.send_request(),
            Role::Server => self.answer_request(),
        }
    }

    fn send_request(&mut self) -> Result<()> {
        let Some(uri) = self.uri.as_ref() else {
            return Err(Error::InvalidState(self.state));
        };
        let context = HandshakeContext::new(uri, &self.config, self.framed.entropy());

        let mut request = Vec::with_capacity(256);
        context.write_request(&mut request)?;
        self.framed.write_raw(&request)?;
        self.framed.flush()?;

        debug!(resource = context.resource(), "sent upgrade request");
        self.handshake = Some(context);
        self.set_state(ConnectionState::Connecting);
        Ok(())
    }

    fn answer_request(&mut self) -> Result<()> {
        let max = self.config.limits.max_handshake_size;
        let head = self.framed.read_handshake(max)?;

        let request = HandshakeRequest::parse_with_limit(&head, max)?;
        request.validate()?;
        if let Some(allowed) = &self.config.allowed_origins {
            validate_origin(request.origin.as_deref(), allowed)?;
        }

        let response = HandshakeResponse::from_request(&request, &self.config.protocols);
        let mut buf = Vec::with_capacity(256);
        response.write(&mut buf)?;
        self.framed.write_raw(&buf)?;
        self.framed.flush()?;

        debug!(
            path = %request.path,
            protocol = ?response.protocol,
            "accepted upgrade request"
        );
        self.resource = Some(request.path);
        self.protocol = response.protocol;
        self.extensions = request.extensions;
        self.set_state(ConnectionState::Open);
        Ok(())
    }

    /// Read and validate the server's handshake response (client only).
    ///
    /// Moves `Connecting` to `Open`. A timeout leaves the state unchanged so
    /// the call can be retried; any other failure moves to `Closed`.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` after the connection has closed
    /// - `Error::InvalidState` in any state other than `Connecting`
    /// - handshake and transport errors
    pub fn accept_handshake(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => {}
            ConnectionState::Closed => return Err(Error::NotOpen(self.state)),
            state => return Err(Error::InvalidState(state)),
        }

        match self.read_response() {
            Ok(response) => {
                debug!(protocol = ?response.protocol, "handshake complete");
                self.handshake = None;
                self.protocol = response.protocol;
                self.extensions = response.extensions;
                self.set_state(ConnectionState::Open);
                Ok(())
            }
            Err(Error::Timeout) => Err(Error::Timeout),
            Err(e) => {
                warn!(error = %e, "handshake failed");
                self.handshake = None;
                self.set_state(ConnectionState::Closed);
                Err(e)
            }
        }
    }

    fn read_response(&mut self) -> Result<HandshakeResponse> {
        let head = self
            .framed
            .read_handshake(self.config.limits.max_handshake_size)?;
        let response = HandshakeResponse::parse(&head)?;
        match &self.handshake {
            Some(context) => context.validate_response(&response)?,
            None => return Err(Error::InvalidState(self.state)),
        }
        Ok(response)
    }

    /// Send one message.
    ///
    /// Text and Binary payloads longer than `Config::fragment_size` are split
    /// into a first frame and Continuation frames. Ping and Pong are sent as
    /// a single frame.
    ///
    /// Errors caused by the arguments leave the connection untouched and
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` unless the connection is `Open`
    /// - `Error::InvalidUtf8` for a Text payload that is not UTF-8
    /// - `Error::ControlFrameTooLarge` for a Ping/Pong over 125 bytes
    /// - `Error::MessageTooLarge` over the configured message limit
    /// - `Error::InvalidFrame` for Close, Continuation or reserved opcodes
    /// - transport errors, `Error::Timeout` included, after which the
    ///   connection is `Closed`
    pub fn send(&mut self, payload: &[u8], opcode: OpCode) -> Result<()> {
        self.require_open()?;

        match opcode {
            OpCode::Text | OpCode::Binary => {
                if opcode == OpCode::Text {
                    validate_utf8(payload)?;
                }
                self.config.limits.check_message_size(payload.len())?;
                let frames = MessageFragmenter::new(payload, opcode, self.config.fragment_size);
                for frame in frames {
                    self.write_frame(&frame)?;
                }
            }
            OpCode::Ping | OpCode::Pong => {
                if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                    return Err(Error::ControlFrameTooLarge(payload.len()));
                }
                self.write_frame(&Frame::new(true, opcode, payload.to_vec()))?;
            }
            OpCode::Close => {
                return Err(Error::InvalidFrame(
                    "Close frames are sent with close()".into(),
                ));
            }
            OpCode::Continuation | OpCode::Reserved(_) => {
                return Err(Error::InvalidFrame(format!(
                    "Cannot send a message with opcode {opcode}"
                )));
            }
        }

        self.flush()
    }

    /// Send a text message.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(text.as_bytes(), OpCode::Text)
    }

    /// Send a binary message.
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send(data, OpCode::Binary)
    }

    /// Send a Ping.
    pub fn ping(&mut self, data: &[u8]) -> Result<()> {
        self.send(data, OpCode::Ping)
    }

    /// Send an unsolicited Pong.
    pub fn pong(&mut self, data: &[u8]) -> Result<()> {
        self.send(data, OpCode::Pong)
    }

    /// Send a [`Message`]; `Message::Close` starts the close handshake.
    pub fn send_message(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::Text(text) => self.send_text(text),
            Message::Binary(data) => self.send_binary(data),
            Message::Ping(data) => self.ping(data),
            Message::Pong(data) => self.pong(data),
            Message::Close(Some(frame)) => self.close(frame.code, &frame.reason),
            Message::Close(None) => self.close(CloseCode::Normal, ""),
        }
    }

    /// Block until a complete message arrives.
    ///
    /// Pings are answered automatically and Pongs are consumed; neither is
    /// returned. A Close from the peer is echoed (if we have not sent one
    /// already), moves the connection to `Closed` and is returned as
    /// `Message::Close`. While `Closing`, data frames are discarded.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` unless the connection is `Open` or `Closing`
    /// - `Error::Timeout` while waiting for a frame, leaving the connection
    ///   as it was (a timeout while writing a Pong closes it)
    /// - any protocol, frame, encoding or transport error, after which the
    ///   connection is `Closed`
    pub fn read(&mut self) -> Result<Message> {
        if !self.state.can_receive() {
            return Err(Error::NotOpen(self.state));
        }

        loop {
            let frame = match self.framed.read_frame() {
                Ok(frame) => frame,
                Err(e) => return Err(self.fail(e)),
            };

            match frame.opcode {
                OpCode::Ping => {
                    if self.state == ConnectionState::Open {
                        trace!(len = frame.payload().len(), "answering ping");
                        let pong = Frame::pong(frame.into_payload());
                        self.write_frame(&pong)?;
                        self.flush()?;
                    }
                }
                OpCode::Pong => trace!(len = frame.payload().len(), "pong received"),
                OpCode::Close => return self.on_close(&frame),
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    if self.state == ConnectionState::Closing {
                        trace!(opcode = %frame.opcode, "discarding data frame while closing");
                        continue;
                    }
                    match self.assembler.push(frame) {
                        Ok(Some(assembled)) => match into_message(assembled) {
                            Ok(message) => return Ok(message),
                            Err(e) => return Err(self.fail(e)),
                        },
                        Ok(None) => {}
                        Err(e) => return Err(self.fail(e)),
                    }
                }
                OpCode::Reserved(op) => {
                    return Err(self.fail(Error::ProtocolViolation(format!(
                        "Reserved opcode {op:#x}"
                    ))));
                }
            }
        }
    }

    fn on_close(&mut self, frame: &Frame) -> Result<Message> {
        let close = match CloseFrame::parse(frame.payload()) {
            Ok(close) => close,
            Err(e) => return Err(self.fail(e)),
        };
        debug!(
            code = ?close.as_ref().map(|c| c.code.as_u16()),
            "close received"
        );

        if self.assembler.is_assembling() {
            debug!("close received mid-message, discarding partial message");
            self.assembler.reset();
        }

        if self.state == ConnectionState::Open {
            let echo = match &close {
                Some(close) => Frame::close(Some(close.code.as_u16()), &close.reason),
                None => Frame::close(None, ""),
            };
            if let Err(e) = self.framed.write_frame(&echo).and_then(|()| self.framed.flush()) {
                debug!(error = %e, "failed to echo close");
            }
        }

        self.set_state(ConnectionState::Closed);
        Ok(Message::Close(close))
    }

    /// Start the close handshake. Only valid in `Open`; moves to `Closing`.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` unless the connection is `Open`
    /// - `Error::InvalidCloseCode` for codes that may not be sent
    /// - `Error::InvalidFrame` if the reason exceeds 123 bytes
    /// - transport errors
    pub fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.require_open()?;

        let payload = CloseFrame::new(code, reason).to_payload()?;
        self.write_frame(&Frame::new(true, OpCode::Close, payload))?;
        self.flush()?;

        debug!(code = code.as_u16(), reason, "close sent");
        self.set_state(ConnectionState::Closing);
        Ok(())
    }

    /// Block until the peer answers our Close, discarding data frames.
    ///
    /// Returns the status the peer sent, if any.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` after the connection has closed
    /// - `Error::InvalidState` unless the connection is `Closing`
    /// - errors from [`read`](Self::read)
    pub fn wait_closed(&mut self) -> Result<Option<CloseFrame>> {
        match self.state {
            ConnectionState::Closing => {}
            ConnectionState::Closed => return Err(Error::NotOpen(self.state)),
            state => return Err(Error::InvalidState(state)),
        }

        loop {
            if let Message::Close(frame) = self.read()? {
                return Ok(frame);
            }
        }
    }

    /// [`close`](Self::close) followed by [`wait_closed`](Self::wait_closed).
    pub fn close_and_wait(&mut self, code: CloseCode, reason: &str) -> Result<Option<CloseFrame>> {
        self.close(code, reason)?;
        self.wait_closed()
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.framed.write_frame(frame).map_err(|e| self.abort(e))
    }

    fn flush(&mut self) -> Result<()> {
        self.framed.flush().map_err(|e| self.abort(e))
    }

    /// Drop to `Closed` after a failed write, timeouts included.
    ///
    /// The stream may end in a partial frame, so no Close is attempted.
    fn abort(&mut self, err: Error) -> Error {
        debug!(error = %err, "write failed");
        self.teardown();
        err
    }

    /// Tear the connection down after a fatal error and hand the error back.
    ///
    /// Read timeouts pass through untouched. Errors with a close status get a
    /// best-effort Close frame if the connection is still `Open`.
    fn fail(&mut self, err: Error) -> Error {
        if err == Error::Timeout {
            return err;
        }

        if self.state == ConnectionState::Open {
            if let Some(code) = err.close_code() {
                warn!(error = %err, code = code.as_u16(), "closing after protocol failure");
                let frame = Frame::close(Some(code.as_u16()), "");
                if let Err(e) = self.framed.write_frame(&frame).and_then(|()| self.framed.flush()) {
                    debug!(error = %e, "failed to send close");
                }
            }
        }
        if err.is_transport() {
            debug!(error = %err, "transport failure");
        }

        self.teardown();
        err
    }

    fn teardown(&mut self) {
        self.assembler.reset();
        self.handshake = None;
        self.set_state(ConnectionState::Closed);
    }
}

fn into_message(assembled: AssembledMessage) -> Result<Message> {
    match assembled.opcode {
        OpCode::Text => assembled.into_text().map(Message::Text),
        OpCode::Binary => Ok(Message::Binary(assembled.into_binary())),
        other => Err(Error::ProtocolViolation(format!(
            "Unexpected message opcode {other}"
        ))),
    }
}
