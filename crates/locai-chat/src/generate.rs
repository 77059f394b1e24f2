//! Stop-sequence truncation and cooperative cancellation around a [`Generator`].

use std::ops::ControlFlow;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use locai_core::error::{Error, Result};
use locai_core::traits::Generator;
use locai_core::types::GenerationOptions;

/// Run `generator` to completion and return its text, cut at the first stop sequence.
///
/// `cancel` is checked before the backend is called and again for every
/// streamed piece; a cancelled generation yields [`Error::Cancelled`] and no text.
pub fn generate(
    generator: &dyn Generator,
    prompt: &str,
    options: &GenerationOptions,
    cancel: &CancellationToken,
) -> Result<String> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let longest_stop = options.stop.iter().map(String::len).max().unwrap_or(0);
    let mut output = String::new();
    let mut pieces = 0usize;
    let mut stopped = false;

    let mut on_token = |piece: &str| -> ControlFlow<()> {
        // A backend may keep streaming after Break; nothing past the stop counts.
        if stopped || cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        pieces += 1;
        let mut from = output.len().saturating_sub(longest_stop);
        output.push_str(piece);
        while !output.is_char_boundary(from) { from -= 1; }
        if let Some(cut) = first_stop(&output[from..], &options.stop) {
            output.truncate(from + cut);
            stopped = true;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    };
    generator.generate_stream(prompt, options, &mut on_token).map_err(Error::backend)?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    debug!("Generated {} pieces, {} bytes (stop sequence hit: {stopped})", pieces, output.len());
    Ok(output)
}

fn first_stop(text: &str, stops: &[String]) -> Option<usize> {
    stops.iter().filter(|s| !s.is_empty()).filter_map(|s| text.find(s.as_str())).min()
}

/// Backend that streams back a fixed reply, or the prompt itself, word by word.
///
/// Deterministic; used for tests and for running the console without a model.
#[derive(Debug, Clone, Default)]
pub struct EchoGenerator {
    reply: Option<String>,
}

impl EchoGenerator {
    pub fn new() -> Self { Self::default() }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self { reply: Some(reply.into()) }
    }
}

impl Generator for EchoGenerator {
    fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> anyhow::Result<()> {
        let text = self.reply.as_deref().unwrap_or(prompt);
        for piece in text.split_inclusive(' ').take(options.max_tokens) {
            if on_token(piece).is_break() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(stop: &[&str]) -> GenerationOptions {
        GenerationOptions { max_tokens: 64, threads: 1, stop: stop.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn output_is_cut_at_first_stop() {
        let echo = EchoGenerator::with_reply("The answer is 42.<|end|> junk after");
        let out = generate(&echo, "q", &opts(&["<|end|>"]), &CancellationToken::new()).unwrap();
        assert_eq!(out, "The answer is 42.");
    }

    #[test]
    fn earliest_of_several_stops_wins() {
        let echo = EchoGenerator::with_reply("one two\nUser: three <|end|>");
        let out = generate(&echo, "q", &opts(&["<|end|>", "\nUser:"]), &CancellationToken::new()).unwrap();
        assert_eq!(out, "one two");
    }

    #[test]
    fn max_tokens_limits_pieces() {
        let echo = EchoGenerator::with_reply("a b c d e");
        let mut options = opts(&[]);
        options.max_tokens = 2;
        assert_eq!(generate(&echo, "q", &options, &CancellationToken::new()).unwrap(), "a b ");
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = generate(&EchoGenerator::new(), "q", &opts(&[]), &cancel);
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    struct CancelAfter {
        token: CancellationToken,
        after: usize,
    }

    impl Generator for CancelAfter {
        fn generate_stream(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
            on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
        ) -> anyhow::Result<()> {
            let mut seen = 0;
            for i in 0..1000 {
                if i == self.after { self.token.cancel(); }
                seen += 1;
                if on_token("x").is_break() { break; }
            }
            assert!(seen < 1000, "backend should be asked to stop");
            Ok(())
        }
    }

    #[test]
    fn cancelled_mid_stream() {
        let token = CancellationToken::new();
        let backend = CancelAfter { token: token.clone(), after: 3 };
        let res = generate(&backend, "q", &opts(&[]), &token);
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    /// Ignores `Break` and streams every piece it was given.
    struct Unstoppable(Vec<&'static str>);

    impl Generator for Unstoppable {
        fn generate_stream(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
            on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
        ) -> anyhow::Result<()> {
            for piece in &self.0 {
                let _ = on_token(piece);
            }
            Ok(())
        }
    }

    #[test]
    fn pieces_after_a_stop_are_dropped_even_if_the_backend_continues() {
        let backend = Unstoppable(vec!["answer<|end|>", " leaked tail", " more"]);
        let out = generate(&backend, "q", &opts(&["<|end|>"]), &CancellationToken::new()).unwrap();
        assert_eq!(out, "answer");
    }
}
