use std::path::PathBuf;

use civitai_fetch::RepoKind;
use civitai_fetch::page::DEFAULT_STYLESHEET;
use civitai_fetch::publish::DEFAULT_HF_ENDPOINT;
use clap::Parser;

/// Mirror a model release (file, preview, metadata, page) and optionally
/// re-publish it to a Hugging Face repository.
#[derive(Debug, Parser)]
#[command(name = "civitai-mirror", version, about)]
pub struct Cli {
    /// Model page URL, e.g. https://civitai.com/models/827184?modelVersionId=925000
    pub url: String,

    /// Hugging Face token (positional form kept for older scripts).
    #[arg(hide = true)]
    pub legacy_hf_token: Option<String>,

    /// Hugging Face repository id (positional form kept for older scripts).
    #[arg(hide = true)]
    pub legacy_repo_id: Option<String>,

    /// Directory that receives the per-model folder.
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// API key for the model host, sent as a bearer token.
    #[arg(long, env = "CIVITAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model host base URL.
    #[arg(long, env = "CIVITAI_HOST", default_value = civitai_fetch::DEFAULT_HOST)]
    pub host: String,

    /// Hugging Face token; publishing needs this and --repo-id.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Hugging Face repository to publish into, e.g. `me/models`.
    #[arg(long)]
    pub repo_id: Option<String>,

    /// Kind of the target repository: model, dataset or space.
    #[arg(long, default_value = "model")]
    pub repo_type: RepoKind,

    /// Hugging Face Hub endpoint.
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_HF_ENDPOINT)]
    pub hf_endpoint: String,

    /// Do not write the HTML description page.
    #[arg(long)]
    pub no_html: bool,

    /// Stylesheet linked from the HTML page.
    #[arg(long, default_value = DEFAULT_STYLESHEET)]
    pub stylesheet: String,

    /// HTTP/HTTPS proxy URL (defaults to HTTP_PROXY / HTTPS_PROXY).
    #[arg(long)]
    pub proxy: Option<String>,

    /// Ignore proxy environment variables.
    #[arg(long, conflicts_with = "proxy")]
    pub no_proxy: bool,

    /// Only report errors; no progress bars.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// `(hf_token, repo_id)` when both are known; flags win over positionals.
    pub fn publish_settings(&self) -> Option<(&str, &str)> {
        let token = self.hf_token.as_deref().or(self.legacy_hf_token.as_deref())?;
        let repo = self.repo_id.as_deref().or(self.legacy_repo_id.as_deref())?;
        Some((token, repo))
    }

    /// Default log filter when neither `RUST_LOG` nor `MIRROR_LOG` is set.
    pub fn default_log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("error")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::try_parse_from(["civitai-mirror", "https://civitai.com/models/1"]).unwrap();
        assert_eq!(cli.url, "https://civitai.com/models/1");
        assert_eq!(cli.output, PathBuf::from("."));
        assert_eq!(cli.repo_type, RepoKind::Model);
        assert!(!cli.no_html);
    }

    #[test]
    fn test_legacy_positionals_enable_publishing() {
        let cli = Cli::try_parse_from([
            "civitai-mirror",
            "https://civitai.com/models/1",
            "hf_legacy",
            "me/legacy",
            "--hf-token",
            "hf_flag",
        ])
        .unwrap();
        assert_eq!(cli.publish_settings(), Some(("hf_flag", "me/legacy")));
    }

    #[test]
    fn test_repo_type_and_flags() {
        let cli = Cli::try_parse_from([
            "civitai-mirror",
            "https://civitai.com/models/1",
            "--repo-type",
            "dataset",
            "--no-html",
            "-o",
            "/tmp/out",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.repo_type, RepoKind::Dataset);
        assert!(cli.no_html);
        assert_eq!(cli.output, PathBuf::from("/tmp/out"));
        assert_eq!(cli.default_log_level(), Some("debug"));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["civitai-mirror", "u", "-q", "-v"]).is_err());
    }
}
