/// 命令加参数拼成单条 shell 命令
///
/// 参数中含有空白或 shell 元字符时用单引号包裹。
pub fn join_command(cmd: &str, args: &[String]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(args.len() + 1);
    let cmd = cmd.trim();
    if !cmd.is_empty() {
        parts.push(cmd.to_string());
    }
    parts.extend(args.iter().map(|a| shell_quote(a)));
    parts.join(" ")
}

/// 结构化参数形式：`["sh", "-c", "<cmd args>"]`
///
/// Kubernetes 一类需要 argv 的后端使用。命令为空时返回空数组，沿用镜像默认入口。
pub fn shell_argv(cmd: &str, args: &[String]) -> Vec<String> {
    let joined = join_command(cmd, args);
    if joined.is_empty() {
        return Vec::new();
    }
    vec!["sh".to_string(), "-c".to_string(), joined]
}

fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let safe = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_plain_args() {
        let args = vec!["-c".to_string(), "10".to_string()];
        assert_eq!(join_command("ping", &args), "ping -c 10");
        assert_eq!(join_command("  sleep 1 ", &[]), "sleep 1");
    }

    #[test]
    fn test_join_quotes_unsafe_args() {
        let args = vec!["hello world".to_string(), "it's".to_string(), String::new()];
        assert_eq!(
            join_command("echo", &args),
            r"echo 'hello world' 'it'\''s' ''"
        );
    }

    #[test]
    fn test_shell_argv() {
        assert!(shell_argv("", &[]).is_empty());
        assert_eq!(shell_argv("ls", &["/tmp".to_string()]), vec!["sh", "-c", "ls /tmp"]);
    }
}
