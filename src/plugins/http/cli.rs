use crate::plugins::registry::DriverContext;
use clap::{Arg, ArgAction, ArgMatches, Command};

/// HTTP-specific flags of the `download` command.
pub struct HttpCliPlugin;

impl HttpCliPlugin {
    pub fn new() -> Self {
        Self
    }

    pub fn augment_download_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("http_header")
                .long("header")
                .help_heading("HTTP")
                .help("Extra HTTP header (repeatable), e.g. --header 'Authorization: Bearer xxx'")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("http_user_agent")
                .long("user-agent")
                .help_heading("HTTP")
                .help("HTTP User-Agent")
                .default_value("OrangeQueue/0.1")
                .num_args(1),
        )
        .arg(
            Arg::new("http_connect_timeout_secs")
                .long("connect-timeout-secs")
                .help_heading("HTTP")
                .help("TCP connect timeout in seconds (0 disables it)")
                .default_value("30")
                .num_args(1),
        )
    }

    pub fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut DriverContext) -> anyhow::Result<()> {
        if let Some(ua) = matches.get_one::<String>("http_user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(s) = matches.get_one::<String>("http_connect_timeout_secs") {
            let secs: u64 = s.parse()?;
            ctx.connect_timeout_secs = (secs > 0).then_some(secs);
        }

        if let Some(values) = matches.get_many::<String>("http_header") {
            for h in values {
                let (k, v) = h
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("invalid header format: {}", h))?;
                ctx.headers.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        Ok(())
    }
}

impl Default for HttpCliPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<DriverContext> {
        let plugin = HttpCliPlugin::new();
        let cmd = plugin.augment_download_command(Command::new("download"));
        let matches = cmd.try_get_matches_from(args)?;
        let mut ctx = DriverContext::default();
        plugin.apply_download_matches(&matches, &mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn collects_headers_and_timeout() {
        let ctx = parse(&[
            "download",
            "--header",
            "Authorization: Bearer t",
            "--connect-timeout-secs",
            "0",
            "--user-agent",
            "ua/1",
        ])
        .unwrap();
        assert_eq!(ctx.headers.get("Authorization").map(String::as_str), Some("Bearer t"));
        assert_eq!(ctx.connect_timeout_secs, None);
        assert_eq!(ctx.user_agent, "ua/1");
    }

    #[test]
    fn header_without_colon_is_rejected() {
        assert!(parse(&["download", "--header", "nope"]).is_err());
    }
}
