//! 网络文件、数据目录的路径解析.
//!
//! 优先级 (从高到低):
//!
//! 1. 命令行参数 (由调用方处理);
//! 2. 环境变量;
//! 3. 当前目录下的 `models` / `data` 目录 (若存在);
//! 4. `$HOME/.brainscan/models` / `$HOME/.brainscan/data`.

use mri_berry::consts::{CLS_MODEL_FILE, SEG_MODEL_FILE};
use std::env;
use std::path::{Path, PathBuf};

/// 网络目录环境变量.
pub const MODEL_DIR_ENV: &str = "BRAINSCAN_MODEL_DIR";

/// 数据目录环境变量.
pub const DATA_DIR_ENV: &str = "BRAINSCAN_DATA_DIR";

/// 分割网络文件环境变量.
pub const SEG_MODEL_ENV: &str = "BRAINSCAN_SEG_MODEL";

/// 分类网络文件环境变量.
pub const CLS_MODEL_ENV: &str = "BRAINSCAN_CLS_MODEL";

/// 用户目录下的配置目录名.
const HOME_SUBDIR: &str = ".brainscan";

/// 数据目录下的会话文件名.
pub const SESSION_FILE: &str = "session.bin";

/// 非空环境变量的值.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 按优先级解析目录.
fn resolve_dir(from_env: Option<String>, cwd: &Path, home: Option<PathBuf>, name: &str) -> PathBuf {
    if let Some(d) = from_env {
        return PathBuf::from(d);
    }
    let local = cwd.join(name);
    if local.is_dir() {
        return local;
    }
    match home {
        Some(h) => h.join(HOME_SUBDIR).join(name),
        None => local,
    }
}

/// 解析网络文件. 相对路径相对于网络目录.
fn resolve_model(from_env: Option<String>, model_dir: &Path, default_file: &str) -> PathBuf {
    match from_env.map(PathBuf::from) {
        Some(p) if p.is_absolute() => p,
        Some(p) => model_dir.join(p),
        None => model_dir.join(default_file),
    }
}

fn cwd() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// 网络目录.
pub fn model_dir() -> PathBuf {
    let d = resolve_dir(non_empty_var(MODEL_DIR_ENV), &cwd(), dirs::home_dir(), "models");
    log::debug!("model dir: {}", d.display());
    d
}

/// 数据目录 (患者记录与会话文件).
pub fn data_dir() -> PathBuf {
    let d = resolve_dir(non_empty_var(DATA_DIR_ENV), &cwd(), dirs::home_dir(), "data");
    log::debug!("data dir: {}", d.display());
    d
}

/// 分割网络文件路径.
pub fn seg_model_path() -> PathBuf {
    seg_model_path_in(&model_dir())
}

/// 网络目录为 `dir` 时的分割网络文件路径. 仍然遵循 [`SEG_MODEL_ENV`].
pub fn seg_model_path_in(dir: &Path) -> PathBuf {
    resolve_model(non_empty_var(SEG_MODEL_ENV), dir, SEG_MODEL_FILE)
}

/// 分类网络文件路径.
pub fn cls_model_path() -> PathBuf {
    cls_model_path_in(&model_dir())
}

/// 网络目录为 `dir` 时的分类网络文件路径. 仍然遵循 [`CLS_MODEL_ENV`].
pub fn cls_model_path_in(dir: &Path) -> PathBuf {
    resolve_model(non_empty_var(CLS_MODEL_ENV), dir, CLS_MODEL_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_wins() {
        let d = resolve_dir(Some("/opt/m".into()), Path::new("/nowhere"), None, "models");
        assert_eq!(d, PathBuf::from("/opt/m"));
    }

    #[test]
    fn test_local_then_home() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("home");

        let d = resolve_dir(None, tmp.path(), Some(home.clone()), "models");
        assert_eq!(d, home.join(".brainscan/models"));

        std::fs::create_dir(tmp.path().join("models")).unwrap();
        let d = resolve_dir(None, tmp.path(), Some(home), "models");
        assert_eq!(d, tmp.path().join("models"));
    }

    #[test]
    fn test_no_home() {
        let tmp = tempfile::tempdir().unwrap();
        let d = resolve_dir(None, tmp.path(), None, "data");
        assert_eq!(d, tmp.path().join("data"));
    }

    #[test]
    fn test_model_file() {
        let dir = Path::new("/m");
        assert_eq!(
            resolve_model(None, dir, SEG_MODEL_FILE),
            PathBuf::from("/m/model_x81_dcs65.rten")
        );
        assert_eq!(
            resolve_model(Some("cls.rten".into()), dir, CLS_MODEL_FILE),
            PathBuf::from("/m/cls.rten")
        );
        assert_eq!(
            resolve_model(Some("/x/y.rten".into()), dir, CLS_MODEL_FILE),
            PathBuf::from("/x/y.rten")
        );
    }

    #[test]
    fn test_model_file_env_in_dir() {
        // 只有这个测试读写该环境变量.
        env::set_var(CLS_MODEL_ENV, "tuned.rten");
        let p = cls_model_path_in(Path::new("/m"));
        env::remove_var(CLS_MODEL_ENV);
        assert_eq!(p, PathBuf::from("/m/tuned.rten"));
        assert_eq!(cls_model_path_in(Path::new("/m")), PathBuf::from("/m").join(CLS_MODEL_FILE));
    }
}
