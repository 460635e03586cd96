//! Configuration Vault – reads/writes `~/.pickrig/config.toml`.

use pickrig_hal::check_conveyor_speed;
use pickrig_runtime::ControllerConfig;
use pickrig_types::{Calibration, MotionLimits, ScheduleConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Where the rig's devices live on the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UR controller address (realtime port and gripper socket).
    pub arm_ip: String,
    pub arm_port: u16,
    pub gripper_port: u16,
    pub vision_ip: String,
    pub vision_port: u16,
    /// Local address the conveyor controller dials into.
    pub conveyor_bind: String,
    pub conveyor_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            arm_ip: "10.10.0.14".to_string(),
            arm_port: 30003,
            gripper_port: 63352,
            vision_ip: "10.10.1.10".to_string(),
            vision_port: 2024,
            conveyor_bind: "0.0.0.0".to_string(),
            conveyor_port: 2002,
        }
    }
}

/// Limits enforced on every plan before the arm moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_intercept_s: f64,
    pub max_reach_m: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_intercept_s: 5.0,
            max_reach_m: 1.3,
        }
    }
}

/// Persisted rig configuration stored in `~/.pickrig/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Seconds to wait for a detection; `0` waits forever.
    #[serde(default = "default_observation_timeout")]
    pub observation_timeout_s: f64,

    /// Pause inside the gripper activation handshake.
    #[serde(default = "default_gripper_settle")]
    pub gripper_settle_s: f64,

    /// Pause after the conveyor controller is powered on.
    #[serde(default = "default_conveyor_settle")]
    pub conveyor_settle_s: f64,

    /// Pause after the arm's initial move home.
    #[serde(default = "default_home_settle")]
    pub home_settle_s: f64,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub limits: MotionLimits,

    #[serde(default)]
    pub calibration: Calibration,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub safety: SafetyConfig,
}

fn default_observation_timeout() -> f64 {
    30.0
}
fn default_gripper_settle() -> f64 {
    3.0
}
fn default_conveyor_settle() -> f64 {
    1.0
}
fn default_home_settle() -> f64 {
    1.0
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            observation_timeout_s: default_observation_timeout(),
            gripper_settle_s: default_gripper_settle(),
            conveyor_settle_s: default_conveyor_settle(),
            home_settle_s: default_home_settle(),
            network: NetworkConfig::default(),
            limits: MotionLimits::default(),
            calibration: Calibration::default(),
            schedule: ScheduleConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(value).map_err(|e| format!("{name} = {value}: {e}"))
}

impl RigConfig {
    /// Reject configurations no cycle could run with.
    pub fn validate(&self) -> Result<(), String> {
        let MotionLimits {
            v_max,
            a_max,
            v_conveyor,
        } = self.limits;
        if !(a_max > 0.0) {
            return Err(format!("limits.a_max must be positive, got {a_max}"));
        }
        if !(v_conveyor < v_max) {
            return Err(format!(
                "limits.v_conveyor ({v_conveyor}) must be below limits.v_max ({v_max})"
            ));
        }
        check_conveyor_speed(v_conveyor * 1000.0).map_err(|e| e.to_string())?;
        let fraction = self.schedule.grasp_lead_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(format!(
                "schedule.grasp_lead_fraction must be in (0, 1], got {fraction}"
            ));
        }
        seconds("schedule.retreat_duration_s", self.schedule.retreat_duration_s)?;
        seconds("schedule.return_settle_s", self.schedule.return_settle_s)?;
        seconds("observation_timeout_s", self.observation_timeout_s)?;
        seconds("gripper_settle_s", self.gripper_settle_s)?;
        seconds("conveyor_settle_s", self.conveyor_settle_s)?;
        seconds("home_settle_s", self.home_settle_s)?;
        Ok(())
    }

    /// `None` when the timeout is zero.
    pub fn observation_timeout(&self) -> Option<Duration> {
        (self.observation_timeout_s > 0.0)
            .then(|| Duration::try_from_secs_f64(self.observation_timeout_s).ok())
            .flatten()
    }

    /// The subset the controller consumes.
    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            limits: self.limits,
            calibration: self.calibration,
            schedule: self.schedule,
            max_intercept_s: self.safety.max_intercept_s,
            max_reach_m: self.safety.max_reach_m,
            observation_timeout: self.observation_timeout(),
        }
    }

    /// Settle times for `(gripper, conveyor, home)`, clamped at zero.
    pub fn settle_times(&self) -> (Duration, Duration, Duration) {
        let d = |s: f64| Duration::try_from_secs_f64(s).unwrap_or_default();
        (
            d(self.gripper_settle_s),
            d(self.conveyor_settle_s),
            d(self.home_settle_s),
        )
    }
}

/// Return the path to `~/.pickrig/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pickrig").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<RigConfig>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<RigConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: RigConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `PICKRIG_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PICKRIG_ARM_IP` | `network.arm_ip` |
/// | `PICKRIG_VISION_IP` | `network.vision_ip` |
/// | `PICKRIG_CONVEYOR_SPEED` | `limits.v_conveyor` (m/s) |
/// | `PICKRIG_OBSERVATION_TIMEOUT` | `observation_timeout_s` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut RigConfig) {
    if let Ok(v) = std::env::var("PICKRIG_ARM_IP") {
        cfg.network.arm_ip = v;
    }
    if let Ok(v) = std::env::var("PICKRIG_VISION_IP") {
        cfg.network.vision_ip = v;
    }
    if let Ok(v) = std::env::var("PICKRIG_CONVEYOR_SPEED")
        && let Ok(speed) = v.trim().parse::<f64>()
    {
        cfg.limits.v_conveyor = speed;
    }
    if let Ok(v) = std::env::var("PICKRIG_OBSERVATION_TIMEOUT")
        && let Ok(secs) = v.trim().parse::<f64>()
    {
        cfg.observation_timeout_s = secs;
    }
}

/// Save the config to disk, creating `~/.pickrig/` if necessary.
pub fn save(cfg: &RigConfig) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &RigConfig, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-var tests mutate process state; run them one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_the_reference_cell() {
        let cfg = RigConfig::default();
        assert_eq!(cfg.network.arm_ip, "10.10.0.14");
        assert_eq!(cfg.network.arm_port, 30003);
        assert_eq!(cfg.network.gripper_port, 63352);
        assert_eq!(cfg.network.vision_port, 2024);
        assert_eq!(cfg.network.conveyor_port, 2002);
        assert_eq!(cfg.limits.v_conveyor, 0.02);
        assert_eq!(cfg.schedule.grasp_lead_fraction, 0.625);
        assert!(cfg.validate().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&RigConfig::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = RigConfig::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "observation_timeout_s = 5.0\n[limits]\nv_max = 1.5\n[network]\narm_ip = \"192.168.1.2\"\n",
        )
        .unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.observation_timeout_s, 5.0);
        assert_eq!(loaded.limits.v_max, 1.5);
        assert_eq!(loaded.limits.a_max, 5.0);
        assert_eq!(loaded.network.arm_ip, "192.168.1.2");
        assert_eq!(loaded.network.vision_ip, "10.10.1.10");
        assert_eq!(loaded.schedule, ScheduleConfig::default());
    }

    #[test]
    fn config_path_points_to_pickrig_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".pickrig"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn env_overrides_apply() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: serialised by ENV_LOCK.
        unsafe {
            std::env::set_var("PICKRIG_ARM_IP", "127.0.0.1");
            std::env::set_var("PICKRIG_VISION_IP", "127.0.0.2");
            std::env::set_var("PICKRIG_CONVEYOR_SPEED", "0.05");
            std::env::set_var("PICKRIG_OBSERVATION_TIMEOUT", "12");
        }
        let mut cfg = RigConfig::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("PICKRIG_ARM_IP");
            std::env::remove_var("PICKRIG_VISION_IP");
            std::env::remove_var("PICKRIG_CONVEYOR_SPEED");
            std::env::remove_var("PICKRIG_OBSERVATION_TIMEOUT");
        }
        assert_eq!(cfg.network.arm_ip, "127.0.0.1");
        assert_eq!(cfg.network.vision_ip, "127.0.0.2");
        assert_eq!(cfg.limits.v_conveyor, 0.05);
        assert_eq!(cfg.observation_timeout_s, 12.0);
    }

    #[test]
    fn env_override_ignores_invalid_number() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: serialised by ENV_LOCK.
        unsafe { std::env::set_var("PICKRIG_CONVEYOR_SPEED", "fast") };
        let mut cfg = RigConfig::default();
        apply_env_overrides(&mut cfg);
        unsafe { std::env::remove_var("PICKRIG_CONVEYOR_SPEED") };
        assert_eq!(cfg.limits.v_conveyor, 0.02);
    }

    #[test]
    fn validate_rejects_bad_limits() {
        let mut cfg = RigConfig::default();
        cfg.limits.a_max = 0.0;
        assert!(cfg.validate().unwrap_err().contains("a_max"));

        let mut cfg = RigConfig::default();
        cfg.limits.v_conveyor = cfg.limits.v_max;
        assert!(cfg.validate().unwrap_err().contains("v_conveyor"));

        // 0.25 m/s is below v_max but above the belt's 200 mm/s ceiling.
        let mut cfg = RigConfig::default();
        cfg.limits.v_conveyor = 0.25;
        assert!(cfg.validate().is_err());

        let mut cfg = RigConfig::default();
        cfg.schedule.grasp_lead_fraction = 1.2;
        assert!(cfg.validate().unwrap_err().contains("grasp_lead_fraction"));

        let mut cfg = RigConfig::default();
        cfg.gripper_settle_s = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RigConfig::default();
        cfg.schedule.return_settle_s = f64::NAN;
        assert!(cfg.validate().unwrap_err().contains("return_settle_s"));
    }

    #[test]
    fn zero_observation_timeout_waits_forever() {
        let mut cfg = RigConfig::default();
        assert_eq!(cfg.observation_timeout(), Some(Duration::from_secs(30)));
        cfg.observation_timeout_s = 0.0;
        assert_eq!(cfg.observation_timeout(), None);
        assert_eq!(cfg.controller().observation_timeout, None);
    }
}
