//! Yes/no confirmation before destructive or suspicious steps

use std::io::{BufRead, Write};
use std::sync::Mutex;

/// Blocking yes/no prompt
pub trait ConfirmationGate: Send + Sync {
    /// Ask the operator; `true` only on an explicit yes
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt the same way without asking
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    answer: bool,
}

impl AutoConfirm {
    pub fn accept() -> Self {
        Self { answer: true }
    }

    pub fn decline() -> Self {
        Self { answer: false }
    }
}

impl ConfirmationGate for AutoConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        log::info!(
            "Auto-{} confirmation: {prompt}",
            if self.answer { "accepted" } else { "declined" }
        );
        self.answer
    }
}

/// Line-based prompt over any reader/writer pair
///
/// Repeats the question until it reads `y`, `yes`, `n` or `no` (any case).
/// End of input counts as no.
pub struct PromptGate<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }
}

impl PromptGate<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Prompt on stderr, read answers from stdin
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

/// Answer parsed from a prompt line
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

impl<R, W> ConfirmationGate for PromptGate<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&self, prompt: &str) -> bool {
        let Ok(mut guard) = self.io.lock() else {
            return false;
        };
        let (input, output) = &mut *guard;

        loop {
            if write!(output, "{prompt} [y/n]: ")
                .and_then(|_| output.flush())
                .is_err()
            {
                return false;
            }

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {
                    if let Some(answer) = parse_answer(&line) {
                        return answer;
                    }
                    let _ = writeln!(output, "Please answer yes or no.");
                }
            }
        }
    }
}
