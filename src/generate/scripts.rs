//! Startup and shutdown script generation
//!
//! Scripts are OS-appropriate: batch on Windows, POSIX shell elsewhere.
//! On unix targets the execute bit is applied as part of generation,
//! not as a later fixup pass.

use std::path::PathBuf;

use crate::atomic::{TextPolicy, make_executable, write_atomic};
use crate::config::COMPOSE_PATH;
use crate::error::Result;
use crate::probe::OsFamily;

use super::GenerateContext;

/// Relative script paths for an OS family: (start, stop)
pub fn script_paths(os: OsFamily) -> (PathBuf, PathBuf) {
    if os.is_windows() {
        (
            PathBuf::from("scripts/start-noxsuite.bat"),
            PathBuf::from("scripts/stop-noxsuite.bat"),
        )
    } else {
        (
            PathBuf::from("scripts/start-noxsuite.sh"),
            PathBuf::from("scripts/stop-noxsuite.sh"),
        )
    }
}

/// Generate both scripts for the context's platform.
pub fn generate(ctx: &GenerateContext) -> Result<Vec<PathBuf>> {
    let os = ctx.profile.os;
    let (start_rel, stop_rel) = script_paths(os);
    let start_path = ctx.cfg.install_dir.join(&start_rel);
    let stop_path = ctx.cfg.install_dir.join(&stop_rel);

    let policy = TextPolicy::script(os);
    if os.is_windows() {
        write_atomic(&start_path, &windows_start_script(ctx), policy)?;
        write_atomic(&stop_path, &windows_stop_script(), policy)?;
    } else {
        write_atomic(&start_path, &posix_start_script(ctx), policy)?;
        write_atomic(&stop_path, &posix_stop_script(), policy)?;
        make_executable(&start_path)?;
        make_executable(&stop_path)?;
    }

    Ok(vec![start_path, stop_path])
}

fn posix_start_script(ctx: &GenerateContext) -> String {
    let install_dir = ctx.cfg.install_dir.display();
    let mut script = format!(
        "#!/bin/bash\n\
         set -e\n\
         \n\
         echo \"Starting NoxSuite...\"\n\
         cd \"{install_dir}\"\n\
         \n\
         docker compose -f {COMPOSE_PATH} up -d\n\
         \n\
         echo \"Waiting for services to become ready...\"\n\
         sleep 15\n\
         \n\
         echo \"NoxSuite is up:\"\n\
         echo \"  Web UI:   http://localhost:3000\"\n\
         echo \"  API docs: http://localhost:8000/api/docs\"\n"
    );
    if ctx.cfg.features.ai_enabled {
        script.push_str("echo \"  Langflow: http://localhost:7860\"\n");
    }
    if ctx.cfg.features.auto_start {
        script.push_str(
            "\ncommand -v xdg-open >/dev/null 2>&1 && xdg-open 'http://localhost:3000' \\\n\
             \t|| command -v open >/dev/null 2>&1 && open 'http://localhost:3000' || true\n",
        );
    }
    script
}

fn posix_stop_script() -> String {
    format!(
        "#!/bin/bash\n\
         set -e\n\
         \n\
         echo \"Stopping NoxSuite...\"\n\
         cd \"$(dirname \"$0\")/..\"\n\
         docker compose -f {COMPOSE_PATH} down\n\
         echo \"NoxSuite stopped.\"\n"
    )
}

fn windows_start_script(ctx: &GenerateContext) -> String {
    let install_dir = ctx.cfg.install_dir.display().to_string().replace('/', "\\");
    let compose = COMPOSE_PATH.replace('/', "\\");
    let mut script = format!(
        "@echo off\r\n\
         echo Starting NoxSuite...\r\n\
         cd /d \"{install_dir}\"\r\n\
         \r\n\
         docker compose -f {compose} up -d\r\n\
         \r\n\
         echo Waiting for services to become ready...\r\n\
         timeout /t 15 /nobreak > nul\r\n\
         \r\n\
         echo NoxSuite is up:\r\n\
         echo   Web UI:   http://localhost:3000\r\n\
         echo   API docs: http://localhost:8000/api/docs\r\n"
    );
    if ctx.cfg.features.ai_enabled {
        script.push_str("echo   Langflow: http://localhost:7860\r\n");
    }
    if ctx.cfg.features.auto_start {
        script.push_str("start http://localhost:3000\r\n");
    }
    script
}

fn windows_stop_script() -> String {
    let compose = COMPOSE_PATH.replace('/', "\\");
    format!(
        "@echo off\r\n\
         echo Stopping NoxSuite...\r\n\
         cd /d \"%~dp0..\"\r\n\
         docker compose -f {compose} down\r\n\
         echo NoxSuite stopped.\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstallConfig, InstallMode};
    use crate::probe::SystemProfile;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> (InstallConfig, SystemProfile) {
        let cfg = InstallConfig::with_defaults(temp.path().to_path_buf(), InstallMode::Fast);
        let profile = SystemProfile::detect();
        (cfg, profile)
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_scripts_are_executable_shell() {
        let temp = TempDir::new().unwrap();
        let (cfg, profile) = context(&temp);
        let ctx = GenerateContext {
            cfg: &cfg,
            profile: &profile,
        };

        let created = generate(&ctx).unwrap();
        assert_eq!(created.len(), 2);

        for path in &created {
            assert!(path.extension().is_some_and(|e| e == "sh"));
            assert!(crate::atomic::is_executable(path), "{path:?} not executable");
            let body = std::fs::read_to_string(path).unwrap();
            assert!(body.starts_with("#!/bin/bash"));
            assert!(!body.contains('\r'));
        }
    }

    #[test]
    fn test_windows_script_bodies_use_batch_syntax() {
        let temp = TempDir::new().unwrap();
        let (mut cfg, profile) = context(&temp);
        cfg.features.auto_start = true;
        let ctx = GenerateContext {
            cfg: &cfg,
            profile: &profile,
        };

        let body = windows_start_script(&ctx);
        assert!(body.starts_with("@echo off"));
        assert!(body.contains("docker compose -f docker\\docker-compose.noxsuite.yml"));
        assert!(body.contains("start http://localhost:3000"));
    }

    #[test]
    fn test_ai_section_follows_flag() {
        let temp = TempDir::new().unwrap();
        let (mut cfg, profile) = context(&temp);

        cfg.features.ai_enabled = true;
        let with_ai = posix_start_script(&GenerateContext {
            cfg: &cfg,
            profile: &profile,
        });
        assert!(with_ai.contains("Langflow"));

        cfg.features.ai_enabled = false;
        let without_ai = posix_start_script(&GenerateContext {
            cfg: &cfg,
            profile: &profile,
        });
        assert!(!without_ai.contains("Langflow"));
    }
}
