use rand::seq::SliceRandom;
use rand::Rng;

/// Fingerprint configuration for anti-detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timezone: String,
    pub locale: String,
    pub languages: Vec<String>,
    pub platform: String,
    pub hardware_concurrency: u32,
    pub device_memory: u32,
}

/// User agent and the `navigator.platform` it implies.
const USER_AGENTS: [(&str, &str); 4] = [
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Win32",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "MacIntel",
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Linux x86_64",
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
        "Win32",
    ),
];

const VIEWPORTS: [(u32, u32); 5] = [
    (1920, 1080),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (1280, 800),
];

/// Locale and a timezone plausible for it.
const LOCALES: [(&str, &str); 5] = [
    ("en-US", "America/New_York"),
    ("en-US", "America/Chicago"),
    ("en-US", "America/Los_Angeles"),
    ("en-GB", "Europe/London"),
    ("en-CA", "America/Toronto"),
];

const CPU_CORES: [u32; 4] = [4, 8, 12, 16];
const MEMORY_GB: [u32; 3] = [4, 8, 16];

impl FingerprintConfig {
    /// Generate a randomized fingerprint configuration
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        let (user_agent, platform) = USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())];
        let (width, height) = VIEWPORTS[rng.gen_range(0..VIEWPORTS.len())];
        let (locale, timezone) = LOCALES[rng.gen_range(0..LOCALES.len())];
        let language = locale.split('-').next().unwrap_or("en");

        Self {
            user_agent: user_agent.to_string(),
            viewport_width: width,
            viewport_height: height,
            timezone: timezone.to_string(),
            locale: locale.to_string(),
            languages: vec![locale.to_string(), language.to_string()],
            platform: platform.to_string(),
            hardware_concurrency: *CPU_CORES.choose(&mut rng).unwrap_or(&8),
            device_memory: *MEMORY_GB.choose(&mut rng).unwrap_or(&8),
        }
    }

    /// Script injected before any page script runs.
    ///
    /// Hides `navigator.webdriver` and aligns the navigator properties with
    /// the rest of the fingerprint.
    pub fn stealth_script(&self) -> String {
        let languages = serde_json::to_string(&self.languages).unwrap_or_else(|_| "[]".into());
        let platform = serde_json::to_string(&self.platform).unwrap_or_else(|_| "\"\"".into());

        format!(
            r"(() => {{
  const define = (obj, key, value) =>
    Object.defineProperty(obj, key, {{ get: () => value, configurable: true }});
  define(Navigator.prototype, 'webdriver', undefined);
  define(Navigator.prototype, 'languages', Object.freeze({languages}));
  define(Navigator.prototype, 'platform', {platform});
  define(Navigator.prototype, 'hardwareConcurrency', {cores});
  define(Navigator.prototype, 'deviceMemory', {memory});
  if (!window.chrome) {{ window.chrome = {{ runtime: {{}} }}; }}
}})();",
            cores = self.hardware_concurrency,
            memory = self.device_memory,
        )
    }

    /// Value for Chromium's `--lang` switch.
    pub fn lang_arg(&self) -> String {
        format!("--lang={}", self.locale)
    }
}
