use std::io::{self, Write};

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

/// A user-facing message about a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

/// Log a notice at the level matching its kind and echo it to the user.
pub fn write(notice: &Notice) -> io::Result<()> {
    write_to(notice, &mut io::stdout(), &mut io::stderr())
}

/// Errors are echoed to `err`, everything else to `out`.
pub fn write_to(notice: &Notice, out: &mut impl Write, err: &mut impl Write) -> io::Result<()> {
    match notice.kind {
        NoticeKind::Error => {
            error!("{}", notice.message);
            writeln!(err, "{}", notice.message)
        }
        NoticeKind::Success => {
            info!(kind = "success", "{}", notice.message);
            writeln!(out, "{}", notice.message)
        }
        NoticeKind::Info => {
            info!("{}", notice.message);
            writeln!(out, "{}", notice.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echoed(notice: &Notice) -> (String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_to(notice, &mut out, &mut err).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn errors_go_to_stderr_only() {
        let (out, err) = echoed(&Notice::error("API Error: 500 - boom"));
        assert!(out.is_empty());
        assert_eq!(err, "API Error: 500 - boom\n");
    }

    #[test]
    fn success_and_info_go_to_stdout() {
        let (out, err) = echoed(&Notice::success("done"));
        assert_eq!(out, "done\n");
        assert!(err.is_empty());
        let (out, _) = echoed(&Notice::info("Score submission acknowledged (Status: 202)!"));
        assert_eq!(out, "Score submission acknowledged (Status: 202)!\n");
    }
}
