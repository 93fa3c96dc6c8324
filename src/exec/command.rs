// src/exec/command.rs

//! Shell command construction shared by installers, compilers and the
//! server launcher.

use std::ffi::OsString;
use std::path::Path;

use tokio::process::Command;

/// Build a shell command appropriate for the platform.
pub fn shell_command(cmdline: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmdline);
        c
    }
}

/// Substitute `{key}` placeholders in a command template.
///
/// Unknown placeholders are left untouched so shell syntax such as `${HOME}`
/// survives.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// `PATH` with `dir` prepended.
pub fn path_with(dir: &Path) -> OsString {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        entries.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(entries).unwrap_or_else(|_| dir.as_os_str().to_os_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_placeholders_only() {
        let rendered = render_template(
            "reflex run --env {mode} --backend-port {port} --home ${HOME} {other}",
            &[("mode", "prod"), ("port", "8000")],
        );
        assert_eq!(
            rendered,
            "reflex run --env prod --backend-port 8000 --home ${HOME} {other}"
        );
    }

    #[test]
    fn path_with_puts_dir_first() {
        let path = path_with(Path::new("/opt/env/bin"));
        let first = std::env::split_paths(&path).next().unwrap();
        assert_eq!(first, Path::new("/opt/env/bin"));
    }
}
