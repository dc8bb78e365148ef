//! 配置管理命令

use crate::utils::resolve_config_path;
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use dxl_teleop::TeleopConfig;
use std::fs;
use std::path::Path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(short, long)]
        force: bool,
    },

    /// 显示生效的配置
    Show,

    /// 检查配置文件
    Check,

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, explicit: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Init { force } => Self::init_(explicit, force),
            ConfigCommand::Show => Self::show_(explicit),
            ConfigCommand::Check => Self::check_(explicit),
            ConfigCommand::Path => {
                println!("{}", resolve_config_path(explicit)?.display());
                Ok(())
            },
        }
    }

    fn init_(explicit: Option<&Path>, force: bool) -> Result<()> {
        let path = resolve_config_path(explicit)?;
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }

        let content = format!(
            "# Dynamixel teleoperation configuration\n\n{}",
            TeleopConfig::default().to_toml()?
        );
        fs::write(&path, content).context("写入配置文件失败")?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }

    fn show_(explicit: Option<&Path>) -> Result<()> {
        let config = crate::utils::load_config(explicit)?;
        print!("{}", config.to_toml()?);
        Ok(())
    }

    fn check_(explicit: Option<&Path>) -> Result<()> {
        let path = resolve_config_path(explicit)?;
        if !path.exists() {
            println!("⚠️ {} 不存在，将使用默认配置", path.display());
            return Ok(());
        }

        let config = TeleopConfig::load(&path)
            .with_context(|| format!("invalid config {}", path.display()))?;
        println!("✅ 配置有效: {}", path.display());
        println!(
            "  从臂: {} {:?} @ {} baud",
            config.follower.port, config.follower.ids, config.follower.baud_rate
        );
        println!(
            "  主臂: {} {:?} @ {} baud",
            config.leader.port, config.leader.ids, config.leader.baud_rate
        );
        println!(
            "  周期: {} ms, 电流上限: {} mA",
            config.period_ms, config.current_limit_ma
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        ConfigCommand::Init { force: false }.execute(Some(&path)).unwrap();
        assert_eq!(TeleopConfig::load(&path).unwrap(), TeleopConfig::default());

        // 已存在时需要 --force
        assert!(ConfigCommand::Init { force: false }.execute(Some(&path)).is_err());
        ConfigCommand::Init { force: true }.execute(Some(&path)).unwrap();
    }

    #[test]
    fn test_check_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "period_ms = 0\n").unwrap();
        assert!(ConfigCommand::Check.execute(Some(&path)).is_err());

        fs::write(&path, "period_ms = 20\n").unwrap();
        ConfigCommand::Check.execute(Some(&path)).unwrap();
    }
}
