use crate::cli_adapter::{self, ChatInput, CHAT_HELP};
use crate::reconciler::{Change, Reconciler};
use crate::render;
use crate::session::SocketSession;
use crate::types::InboundEvent;
use anyhow::Result;
use std::io::Write;
use tokio::sync::mpsc;

enum Flow {
    Continue,
    Quit,
}

/// Drives the agent chat: user lines go out over the socket, socket events
/// are folded into the transcript and echoed as they stream in.
pub struct Coordinator<W: Write> {
    session: SocketSession,
    reconciler: Reconciler,
    out: W,
    // An agent line has been started on `out` and not yet terminated.
    line_open: bool,
    // A message went out and its reply has not completed or failed yet.
    reply_pending: bool,
}

impl<W: Write> Coordinator<W> {
    pub fn new(session: SocketSession, out: W) -> Self {
        Self {
            session,
            reconciler: Reconciler::new(),
            out,
            line_open: false,
            reply_pending: false,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn session(&self) -> &SocketSession {
        &self.session
    }

    pub async fn run(&mut self, input: &mut mpsc::UnboundedReceiver<String>) -> Result<()> {
        if let Err(err) = self.session.connect().await {
            writeln!(self.out, "{}", render::status_line(false, 0))?;
            return Err(err.into());
        }
        writeln!(self.out, "{}", render::status_line(true, 0))?;

        let mut input_open = true;
        loop {
            // Once stdin is exhausted, stay only long enough to finish the reply.
            if !input_open && !(self.session.is_connected() && self.awaiting_reply()) {
                break;
            }
            tokio::select! {
                biased;
                maybe_event = self.session.receive(), if self.session.is_connected() => {
                    match maybe_event {
                        Some(Ok(event)) => self.handle_event(event)?,
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "socket event error");
                            if !self.session.is_connected() {
                                self.handle_disconnect()?;
                            }
                        }
                        None => self.handle_disconnect()?,
                    }
                }
                maybe_line = input.recv(), if input_open => {
                    let Some(line) = maybe_line else {
                        tracing::debug!("input closed");
                        input_open = false;
                        continue;
                    };
                    if let Flow::Quit = self.handle_input(&line).await? {
                        break;
                    }
                }
                else => break,
            }
        }

        self.session.disconnect().await;
        self.reconciler.end_session();
        self.close_line()?;
        Ok(())
    }

    async fn handle_input(&mut self, line: &str) -> Result<Flow> {
        let input = match cli_adapter::parse_input(line) {
            Ok(input) => input,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring input");
                if !line.trim().is_empty() {
                    self.close_line()?;
                    writeln!(self.out, "{err}; /help lists the commands")?;
                }
                return Ok(Flow::Continue);
            }
        };

        match input {
            ChatInput::Quit => return Ok(Flow::Quit),
            ChatInput::Clear => {
                self.reconciler.clear();
                self.close_line()?;
                writeln!(self.out, "(chat cleared)")?;
            }
            ChatInput::Show => {
                self.close_line()?;
                for line in
                    render::render_transcript(self.reconciler.messages(), self.reconciler.is_typing())
                {
                    writeln!(self.out, "{line}")?;
                }
                self.write_status()?;
            }
            ChatInput::Status => {
                self.close_line()?;
                self.write_status()?;
            }
            ChatInput::Help => {
                self.close_line()?;
                writeln!(self.out, "{CHAT_HELP}")?;
            }
            ChatInput::Message(text) => self.send_message(text).await?,
        }
        Ok(Flow::Continue)
    }

    async fn send_message(&mut self, text: String) -> Result<()> {
        if !self.session.is_connected() {
            writeln!(self.out, "not connected; message not sent")?;
            return Ok(());
        }
        if self.reconciler.is_typing() {
            writeln!(self.out, "agent is still responding; wait for it to finish")?;
            return Ok(());
        }
        match self.session.send(&text).await {
            Ok(()) => {
                self.reconciler.push_user(text);
                self.reply_pending = true;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to send message");
                writeln!(self.out, "send failed: {err}")?;
            }
        }
        Ok(())
    }

    fn awaiting_reply(&self) -> bool {
        self.reply_pending || self.reconciler.is_typing()
    }

    fn handle_event(&mut self, event: InboundEvent) -> Result<()> {
        if matches!(event, InboundEvent::Complete { .. } | InboundEvent::Error { .. }) {
            self.reply_pending = false;
        }
        match self.reconciler.apply(event) {
            Change::None => {}
            Change::TypingStarted => {
                self.close_line()?;
                writeln!(self.out, "{}", render::TYPING_LINE)?;
            }
            Change::Created { index } => {
                self.close_line()?;
                let message = &self.reconciler.messages()[index];
                write!(
                    self.out,
                    "{}: {}",
                    render::sender_label(message.sender),
                    message.content
                )?;
                self.line_open = true;
            }
            Change::Appended { delta, .. } => {
                write!(self.out, "{delta}")?;
                self.line_open = true;
            }
            Change::Replaced { index } => {
                self.close_line()?;
                let message = &self.reconciler.messages()[index];
                write!(
                    self.out,
                    "{}: {}",
                    render::sender_label(message.sender),
                    message.content
                )?;
                self.line_open = true;
            }
            Change::Finalized { index, rewritten } => {
                self.close_line()?;
                if rewritten {
                    let line = render::render_message(&self.reconciler.messages()[index]);
                    writeln!(self.out, "{line}")?;
                }
            }
            Change::ErrorAppended { index } => {
                self.close_line()?;
                let line = render::render_message(&self.reconciler.messages()[index]);
                writeln!(self.out, "{line}")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn handle_disconnect(&mut self) -> Result<()> {
        self.reply_pending = false;
        self.reconciler.end_session();
        self.close_line()?;
        self.write_status()?;
        writeln!(self.out, "sending is disabled; /quit to leave")?;
        Ok(())
    }

    fn write_status(&mut self) -> Result<()> {
        let line = render::status_line(
            self.session.is_connected(),
            self.reconciler.messages().len(),
        );
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    fn close_line(&mut self) -> Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }
}
