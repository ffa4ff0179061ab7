//! run サブコマンド
//!
//! ボットを起動します。フラグは環境変数より優先されます。

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::BotConfig;

/// run サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Bot API base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Directory holding bot assets
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Long polling timeout in seconds
    #[arg(long)]
    pub poll_timeout_secs: Option<u64>,
}

impl RunArgs {
    /// 指定されたフラグで設定を上書きする
    pub fn apply(&self, mut config: BotConfig) -> BotConfig {
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.assets_dir {
            config.assets_dir = dir.clone();
        }
        if let Some(secs) = self.poll_timeout_secs {
            config.poll_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BotConfig {
        BotConfig {
            token: "t".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            assets_dir: PathBuf::from("assets"),
            poll_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_apply_without_flags_keeps_config() {
        assert_eq!(RunArgs::default().apply(base()), base());
    }

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs {
            api_url: Some("http://localhost:8081/".to_string()),
            assets_dir: Some(PathBuf::from("/srv/assets")),
            poll_timeout_secs: Some(1),
        };
        let config = args.apply(base());
        assert_eq!(config.api_url, "http://localhost:8081");
        assert_eq!(config.assets_dir, PathBuf::from("/srv/assets"));
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.token, "t");
    }
}
