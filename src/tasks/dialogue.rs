//! Speech bubble with a typewriter reveal.

use crate::actor::{ActorContext, AnimationTrigger};
use crate::config::TaskConfig;
use crate::error::{PomoError, Result};
use crate::scheduler::task::{ActorTask, TaskDescriptor, TaskKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Summary length used in descriptors.
const SUMMARY_CHARS: usize = 24;

/// Split `text` into the pieces appended one per reveal step.
///
/// Each character is its own piece, except that the two-character escape
/// `\n` (backslash followed by `n`) becomes a single line break.
pub fn reveal_fragments(text: &str) -> Vec<String> {
    let mut fragments = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'n') {
            chars.next();
            fragments.push("\n".to_owned());
        } else {
            fragments.push(c.to_string());
        }
    }
    fragments
}

/// Shows a line of dialogue above the actor.
#[derive(Debug)]
pub struct DialogueTask {
    text: String,
    char_delay: Duration,
    display: Duration,
    greet: bool,
    closed: bool,
}

impl DialogueTask {
    /// Say `text`.
    pub fn new(text: impl Into<String>, config: &TaskConfig) -> Self {
        Self {
            text: text.into(),
            char_delay: Duration::from_millis(config.char_delay_ms),
            display: Duration::from_millis(config.dialogue_display_ms),
            greet: false,
            closed: false,
        }
    }

    /// Wave at the player, then say `text`.
    pub fn greeting(text: impl Into<String>, config: &TaskConfig) -> Self {
        Self {
            greet: true,
            ..Self::new(text, config)
        }
    }

    /// The raw payload, escapes included.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn close(&mut self, ctx: &ActorContext) {
        if self.closed {
            return;
        }
        self.closed = true;
        ctx.dialogue.clear();
        ctx.dialogue.hide();
    }
}

#[async_trait]
impl ActorTask for DialogueTask {
    fn descriptor(&self) -> TaskDescriptor {
        let mut summary: String = self.text.chars().take(SUMMARY_CHARS).collect();
        if self.text.chars().nth(SUMMARY_CHARS).is_some() {
            summary.push_str("...");
        }
        TaskDescriptor::new(TaskKind::Dialogue, format!("\"{summary}\""))
    }

    async fn execute(&mut self, ctx: &ActorContext, cancel: &CancellationToken) -> Result<()> {
        if self.closed || cancel.is_cancelled() {
            return Err(PomoError::Cancelled);
        }
        if self.greet {
            ctx.animator.trigger(AnimationTrigger::Greet);
        }
        if self.text.is_empty() {
            return Ok(());
        }

        ctx.dialogue.clear();
        ctx.dialogue.show();

        let fragments = reveal_fragments(&self.text);
        let char_delay = self.char_delay;
        let reveal = async {
            for fragment in &fragments {
                tokio::time::sleep(char_delay).await;
                ctx.dialogue.append(fragment);
            }
        };
        let display = tokio::time::sleep(self.display);

        tokio::select! {
            () = cancel.cancelled() => Err(PomoError::Cancelled),
            _ = async { tokio::join!(reveal, display) } => Ok(()),
        }
    }

    fn cancel(&mut self, ctx: &ActorContext) {
        self.close(ctx);
    }

    fn finish(&mut self, ctx: &ActorContext) {
        self.close(ctx);
    }
}
