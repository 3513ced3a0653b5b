use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use address::{AddressTable, HookTarget, SingletonOffsets};
use shared_dx::error::{HookError, Result};
use shared_dx::util::{write_log_file, LogLevel};

pub const CONFIG_FILE_NAME: &str = "overlay_core.yaml";
pub const DEFAULT_HOST_VERSION: u32 = 421810;

/// An address in the config.  YAML has no reliable hex integers, so a quoted "0x..." string
/// is accepted as well as a plain number.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ConfAddress {
    Num(u64),
    Text(String),
}

impl ConfAddress {
    pub fn value(&self) -> Result<usize> {
        match self {
            ConfAddress::Num(n) => Ok(*n as usize),
            ConfAddress::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => usize::from_str_radix(hex, 16),
                    None => s.parse::<usize>(),
                };
                parsed.map_err(|e| HookError::ConfReadFailed(format!("bad address '{}': {}", s, e)))
            }
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SingletonConf {
    pub renderer: usize,
    pub command_queue: usize,
    pub swap_chain: usize,
}

impl Default for SingletonConf {
    fn default() -> Self {
        let o = SingletonOffsets::default();
        SingletonConf {
            renderer: o.renderer,
            command_queue: o.command_queue,
            swap_chain: o.swap_chain,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Title of the host's main window.
    pub window_title: String,
    /// Host build the address tables are keyed by.
    pub host_version: u32,
    pub log_level: String,
    pub log_file: Option<String>,
    /// Module exporting the loader's `Log` and `GetAddress` functions.
    pub loader_module: String,
    /// Slots in the shader-visible heap (font atlas plus textures).
    pub descriptor_heap_size: u32,
    /// Name the overlay renderer registers its per-frame function under.
    pub renderer_method: String,
    pub render_singleton: SingletonConf,
    /// host version → target name → address.  Merged over the built-in tables.
    pub address_tables: BTreeMap<u32, BTreeMap<String, ConfAddress>>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OverlayConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "OverlayConfig {{")?;
        writeln!(f, "  window_title: {}", self.window_title)?;
        writeln!(f, "  host_version: {}", self.host_version)?;
        writeln!(f, "  log_level: {}", self.log_level)?;
        writeln!(f, "  log_file: {:?}", self.log_file)?;
        writeln!(f, "  loader_module: {}", self.loader_module)?;
        writeln!(f, "  descriptor_heap_size: {}", self.descriptor_heap_size)?;
        writeln!(f, "  renderer_method: {}", self.renderer_method)?;
        writeln!(
            f,
            "  render_singleton: renderer {:#x}, queue {:#x}, swap chain {:#x}",
            self.render_singleton.renderer,
            self.render_singleton.command_queue,
            self.render_singleton.swap_chain
        )?;
        match self.address_tables.get(&self.host_version) {
            None => writeln!(f, "  no address overrides")?,
            Some(t) => {
                writeln!(f, "  address overrides:")?;
                for (name, addr) in t.iter() {
                    writeln!(f, "    {}: {:?}", name, addr)?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

/// Addresses for host builds we know about.
fn builtin_table(host_version: u32) -> AddressTable {
    let mut t = AddressTable::new();
    if host_version == DEFAULT_HOST_VERSION {
        t.insert(HookTarget::TitleReady, 0x141EFFDF0);
        t.insert(HookTarget::RenderSingleton, 0x1451C4480);
    }
    t
}

impl OverlayConfig {
    pub fn new() -> Self {
        Self {
            window_title: format!("MONSTER HUNTER: WORLD({})", DEFAULT_HOST_VERSION),
            host_version: DEFAULT_HOST_VERSION,
            log_level: "debug".to_owned(),
            log_file: None,
            loader_module: "eigeen_loader.dll".to_owned(),
            descriptor_heap_size: 256,
            renderer_method: "Render::core_imgui_render".to_owned(),
            render_singleton: SingletonConf::default(),
            address_tables: BTreeMap::new(),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let c: OverlayConfig = serde_yaml::from_str(text)
            .map_err(|e| HookError::ConfReadFailed(format!("deserialize error: {}", e)))?;
        c.validate()?;
        Ok(c)
    }

    /// Read `overlay_core.yaml` from `rootdir`.  A missing file is not an error.
    pub fn load(rootdir: &str) -> Result<Self> {
        use std::path::PathBuf;
        let mut pb = PathBuf::from(&rootdir);
        pb.push(CONFIG_FILE_NAME);

        if !pb.is_file() {
            write_log_file(&format!("overlay config does not exist: {:?}; using defaults", pb));
            return Ok(OverlayConfig::new());
        }

        let text = std::fs::read_to_string(&pb)?;
        Self::from_yaml(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.descriptor_heap_size < 2 {
            return Err(HookError::ConfReadFailed(format!(
                "descriptor_heap_size must be at least 2, got {}",
                self.descriptor_heap_size
            )));
        }
        if let Some(t) = self.address_tables.get(&self.host_version) {
            for addr in t.values() {
                addr.value()?;
            }
        }
        Ok(())
    }

    /// Configured level, or debug if it doesn't parse.
    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or_else(|e| {
            write_log_file(&format!("{:?}; logging at debug", e));
            LogLevel::Debug
        })
    }

    /// Built-in addresses for `host_version` with the config's entries laid over them.
    pub fn address_table(&self) -> AddressTable {
        let mut t = builtin_table(self.host_version);
        if let Some(overrides) = self.address_tables.get(&self.host_version) {
            let mut pairs = Vec::new();
            for (name, addr) in overrides.iter() {
                match addr.value() {
                    Ok(v) => pairs.push((name.as_str(), v)),
                    Err(e) => write_log_file(&format!("skipping {}: {:?}", name, e)),
                }
            }
            t.merge(&AddressTable::from_named(pairs));
        }
        t
    }

    pub fn singleton_offsets(&self) -> SingletonOffsets {
        SingletonOffsets {
            renderer: self.render_singleton.renderer,
            command_queue: self.render_singleton.command_queue,
            swap_chain: self.render_singleton.swap_chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use address::Resolver;

    #[test]
    fn test_defaults() {
        let c = OverlayConfig::new();
        assert_eq!(c.window_title, "MONSTER HUNTER: WORLD(421810)");
        assert_eq!(c.log_level(), LogLevel::Debug);
        let t = c.address_table();
        assert_eq!(t.resolve(HookTarget::TitleReady).expect("doh"), 0x141EFFDF0);
        assert_eq!(t.resolve(HookTarget::RenderSingleton).expect("doh"), 0x1451C4480);
        assert!(t.resolve(HookTarget::Present).is_err());
        assert_eq!(c.singleton_offsets(), SingletonOffsets::default());
    }

    #[test]
    fn test_partial_yaml() {
        let c = OverlayConfig::from_yaml(
            "log_level: info\ndescriptor_heap_size: 64\nrender_singleton:\n  swap_chain: 5248\n",
        )
        .expect("doh");
        assert_eq!(c.log_level(), LogLevel::Info);
        assert_eq!(c.descriptor_heap_size, 64);
        assert_eq!(c.render_singleton.swap_chain, 5248);
        assert_eq!(c.render_singleton.renderer, 0x78);
        assert_eq!(c.loader_module, "eigeen_loader.dll");
    }

    #[test]
    fn test_address_overrides() {
        let yaml = r#"
host_version: 421810
address_tables:
  421810:
    "GUITitle:Play": "0x141F00000"
    signal: 4096
  999999:
    present: "0x1"
"#;
        let c = OverlayConfig::from_yaml(yaml).expect("doh");
        let t = c.address_table();
        assert_eq!(t.resolve(HookTarget::TitleReady).expect("doh"), 0x141F00000);
        assert_eq!(t.resolve(HookTarget::Signal).expect("doh"), 4096);
        assert_eq!(t.resolve(HookTarget::RenderSingleton).expect("doh"), 0x1451C4480);
        assert!(t.resolve(HookTarget::Present).is_err());
    }

    #[test]
    fn test_unknown_version_has_no_builtins() {
        let c = OverlayConfig::from_yaml("host_version: 1\n").expect("doh");
        assert!(c.address_table().is_empty());
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(
            OverlayConfig::from_yaml("descriptor_heap_size: 1\n"),
            Err(HookError::ConfReadFailed(_))
        ));
        assert!(matches!(
            OverlayConfig::from_yaml("address_tables:\n  421810:\n    signal: \"0xZZ\"\n"),
            Err(HookError::ConfReadFailed(_))
        ));
        assert!(OverlayConfig::from_yaml("window_title: [1, 2").is_err());
        let c = OverlayConfig::from_yaml("log_level: shouty\n").expect("doh");
        assert_eq!(c.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = std::env::temp_dir().join("__overlay_conf_missing");
        let c = OverlayConfig::load(&dir.to_string_lossy()).expect("doh");
        assert_eq!(c, OverlayConfig::new());
    }
}
