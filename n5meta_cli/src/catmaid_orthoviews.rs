use std::time::Duration;

use n5meta::orthoview::{OrthoviewOptions, OrthoviewReport};
use n5meta_http::{BasicAuth, HttpSourceOptions, open_source};

use crate::Result;

/// Arguments of `catmaid-orthoviews`.
#[derive(clap::Args, Debug)]
pub(crate) struct Args {
    /// Path or URL to the root of the N5 container
    root: String,

    /// Name of the multiscale group within the container, which contains the scales s0, s1 etc.
    group: String,

    /// URL of an h2n5 instance serving this container, ending before 'tile'
    #[arg(short = 'r', long)]
    h2n5_root: Option<String>,

    /// Omit the stack mirror information for the raw N5 stack
    #[arg(short, long)]
    no_n5: bool,

    /// HTTP basic authentication for reading the container, as 'username:password'
    #[arg(short = 'a', long, value_name = "USERNAME:PASSWORD")]
    http_basic_auth: Option<BasicAuth>,

    /// Skip TLS certificate and hostname verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Request timeout in seconds, 0 for none
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,
}

impl Args {
    fn source_options(&self) -> HttpSourceOptions {
        let mut options = HttpSourceOptions::default();
        options
            .timeout((self.timeout > 0).then(|| Duration::from_secs(self.timeout)))
            .insecure(self.insecure)
            .basic_auth(self.http_basic_auth.clone());
        options
    }

    fn orthoview_options(&self) -> OrthoviewOptions {
        let mut options = OrthoviewOptions::default();
        options
            .h2n5_root(self.h2n5_root.clone())
            .include_n5(!self.no_n5);
        options
    }
}

pub(crate) fn run(args: &Args) -> Result<()> {
    let source = open_source(&args.root, &args.source_options())?;
    let report = OrthoviewReport::fetch(source.as_ref(), &args.group)?;
    println!(
        "{}",
        report.render(&args.root, &args.group, &args.orthoview_options())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::{Cli, Command};

    fn parse(args: &[&str]) -> std::result::Result<Args, clap::Error> {
        let cli = Cli::try_parse_from(
            ["n5meta", "catmaid-orthoviews"]
                .into_iter()
                .chain(args.iter().copied()),
        )?;
        match cli.command {
            Command::CatmaidOrthoviews(args) => Ok(args),
            _ => unreachable!(),
        }
    }

    #[test]
    fn catmaid_orthoviews_args() {
        let args = parse(&[
            "https://example.com/data.n5",
            "volumes/raw",
            "-r",
            "https://h2n5.example.com",
            "-n",
            "-a",
            "user:pa:ss",
            "-k",
            "-t",
            "0",
        ])
        .unwrap();
        assert_eq!(args.root, "https://example.com/data.n5");
        assert_eq!(args.group, "volumes/raw");
        assert_eq!(args.h2n5_root.as_deref(), Some("https://h2n5.example.com"));
        assert!(args.no_n5 && args.insecure);
        assert_eq!(args.timeout, 0);
        assert_eq!(
            args.http_basic_auth.as_ref().map(BasicAuth::username),
            Some("user")
        );

        let args = parse(&["/data.n5", "raw"]).unwrap();
        assert_eq!(args.timeout, 30);
        assert!(!args.insecure);
        assert!(args.http_basic_auth.is_none());
    }

    #[test]
    fn catmaid_orthoviews_rejects_invalid_auth() {
        assert!(parse(&["/data.n5", "raw", "-a", "user"]).is_err());
    }
}
