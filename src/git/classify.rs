//! Failure classification over captured tool output
//!
//! The exit status is the primary failure signal. The substring scan over
//! stderr is retained for the classes git only reports as human-readable text
//! (conflict markers, unmergeable references) and for the occasional path
//! where git writes `fatal:`/`error:` while still exiting zero. The scan is
//! version- and locale-fragile, which is why it stays isolated here behind
//! the stable [`super::GitError`] taxonomy.

use crate::subprocess::ProcessOutput;

/// Did this invocation fail, by exit status or by error text on stderr?
pub fn is_failure(output: &ProcessOutput) -> bool {
    !output.status.success() || stderr_indicates_failure(&output.stderr)
}

/// Scan stderr for git's error prefixes.
pub fn stderr_indicates_failure(stderr: &str) -> bool {
    stderr.contains("fatal:") || stderr.contains("error:")
}

/// Does the output carry a merge conflict marker? git prints conflicts on
/// stdout (`CONFLICT (content): Merge conflict in ...`) but older versions
/// and some configurations use stderr, so both streams are scanned.
pub fn has_conflict_marker(output: &ProcessOutput) -> bool {
    contains_conflict_text(&output.stdout) || contains_conflict_text(&output.stderr)
}

fn contains_conflict_text(text: &str) -> bool {
    text.contains("Merge conflict") || text.contains("CONFLICT")
}

/// The reference passed to `git merge` was not something git can merge.
pub fn is_unmergeable(output: &ProcessOutput) -> bool {
    output.stderr.contains("not something we can merge")
}

/// Surface raw output on the diagnostic channel. Merge-lifecycle operations
/// are inherently interactive; their output is informational for the operator
/// in addition to being classified.
pub fn surface(operation: &str, output: &ProcessOutput) {
    if !output.stdout.is_empty() {
        tracing::info!(operation, "{}", output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        tracing::info!(operation, "{}", output.stderr.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::ExitStatus;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn output(status: ExitStatus, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let out = output(ExitStatus::Error(128), "", "");
        assert!(is_failure(&out));
    }

    #[test]
    fn test_fatal_on_stderr_is_failure_even_with_zero_exit() {
        let out = output(
            ExitStatus::Success,
            "",
            "fatal: not a git repository (or any of the parent directories): .git",
        );
        assert!(is_failure(&out));
    }

    #[test]
    fn test_clean_success_is_not_failure() {
        let out = output(ExitStatus::Success, "On branch master\n", "");
        assert!(!is_failure(&out));
    }

    #[test]
    fn test_progress_chatter_on_stderr_is_not_failure() {
        // git writes progress and hints to stderr on success
        let out = output(
            ExitStatus::Success,
            "",
            "Switched to a new branch 'feature'\n",
        );
        assert!(!is_failure(&out));
    }

    #[test]
    fn test_conflict_marker_on_stdout() {
        let out = output(
            ExitStatus::Error(1),
            "Auto-merging notes.txt\nCONFLICT (content): Merge conflict in notes.txt\nAutomatic merge failed; fix conflicts and then commit the result.\n",
            "",
        );
        assert!(has_conflict_marker(&out));
    }

    #[test]
    fn test_conflict_marker_on_stderr() {
        let out = output(ExitStatus::Error(1), "", "Merge conflict in notes.txt\n");
        assert!(has_conflict_marker(&out));
        assert!(!has_conflict_marker(&output(
            ExitStatus::Success,
            "Already up to date.\n",
            ""
        )));
    }

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_surface_emits_both_streams_on_diagnostic_channel() {
        let writer = CaptureWriter::default();
        let sink = writer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_max_level(tracing::Level::INFO)
            .finish();

        let out = output(
            ExitStatus::Error(1),
            "CONFLICT (content): Merge conflict in notes.txt\n",
            "Automatic merge failed; fix conflicts and then commit the result.\n",
        );
        tracing::subscriber::with_default(subscriber, || {
            surface("merge", &out);
        });

        let logged = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("CONFLICT (content)"));
        assert!(logged.contains("Automatic merge failed"));
        assert!(logged.contains("merge"));
    }

    #[test]
    fn test_surface_is_silent_for_empty_output() {
        let writer = CaptureWriter::default();
        let sink = writer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            surface("merge --abort", &output(ExitStatus::Success, "", ""));
        });

        assert!(writer.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unmergeable_reference() {
        let out = output(
            ExitStatus::Error(1),
            "",
            "merge: nonsense - not something we can merge\n",
        );
        assert!(is_unmergeable(&out));
    }
}
