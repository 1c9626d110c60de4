//! Build script for typebridge-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bridge.toml at compile time
//! - Checks the radio firmware blobs are present

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const RADIO_BLOBS: [&str; 2] = ["cyw43-firmware/43439A0.bin", "cyw43-firmware/43439A0_clm.bin"];

fn main() {
    setup_linker();
    validate_config();
    check_radio_firmware();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate bridge.toml at compile time
///
/// Mirrors the rules of the runtime parser so a bad file fails the build
/// instead of the boot.
fn validate_config() {
    println!("cargo:rerun-if-changed=bridge.toml");

    let config_path = Path::new("bridge.toml");
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: bridge.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds bridge.toml for its Wi-Fi credentials and   ║\n\
            ║  link timing. Create one in the typebridge-firmware directory.   ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bridge.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in bridge.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_network(&config, &mut errors);
    validate_link(&config, &mut errors);
    validate_keyboard(&config, &mut errors);
    validate_protocol(&config, &mut errors);
    validate_session(&config, &mut errors);
    validate_known_sections(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid values in bridge.toml                            ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=bridge.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Known keys of one section, with their check
type KeyRule = (&'static str, fn(&toml::Value) -> bool);

fn section<'a>(config: &'a toml::Value, name: &str) -> Option<&'a toml::value::Table> {
    config.get(name).and_then(toml::Value::as_table)
}

fn check_section(config: &toml::Value, name: &str, rules: &[KeyRule], errors: &mut Vec<String>) {
    let Some(table) = section(config, name) else {
        return;
    };
    for (key, value) in table {
        match rules.iter().find(|(known, _)| known == key) {
            Some((_, check)) if !check(value) => {
                errors.push(format!("[{}] {} has an invalid value", name, key));
            }
            Some(_) => {}
            None => errors.push(format!("[{}] unknown key {}", name, key)),
        }
    }
}

fn is_positive_u32(value: &toml::Value) -> bool {
    value
        .as_integer()
        .is_some_and(|n| n > 0 && n <= i64::from(u32::MAX))
}

fn is_u32(value: &toml::Value) -> bool {
    value
        .as_integer()
        .is_some_and(|n| n >= 0 && n <= i64::from(u32::MAX))
}

fn is_port(value: &toml::Value) -> bool {
    value
        .as_integer()
        .is_some_and(|n| n > 0 && n <= i64::from(u16::MAX))
}

fn is_ssid(value: &toml::Value) -> bool {
    value.as_str().is_some_and(|s| s.len() <= 32)
}

fn is_password(value: &toml::Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.is_empty() || (8..=64).contains(&s.len()))
}

fn is_reset_policy(value: &toml::Value) -> bool {
    matches!(value.as_str(), Some("always" | "response_only"))
}

fn is_mode(value: &toml::Value) -> bool {
    matches!(value.as_str(), Some("explicit" | "implicit"))
}

fn validate_network(config: &toml::Value, errors: &mut Vec<String>) {
    check_section(
        config,
        "network",
        &[("ssid", is_ssid), ("password", is_password), ("port", is_port)],
        errors,
    );

    let ssid = section(config, "network")
        .and_then(|t| t.get("ssid"))
        .and_then(toml::Value::as_str)
        .unwrap_or("");
    if ssid.is_empty() {
        println!("cargo:warning=bridge.toml has no network.ssid, the bridge will not join Wi-Fi");
    }
}

fn validate_link(config: &toml::Value, errors: &mut Vec<String>) {
    check_section(
        config,
        "link",
        &[
            ("handshake_timeout_us", is_positive_u32),
            ("response_timeout_us", is_positive_u32),
            ("poll_interval_us", is_positive_u32),
            ("continuation_window_us", is_positive_u32),
            ("reset_pulse_us", is_positive_u32),
            ("reset_policy", is_reset_policy),
        ],
        errors,
    );
}

fn validate_keyboard(config: &toml::Value, errors: &mut Vec<String>) {
    check_section(config, "keyboard", &[("settle_us", is_u32)], errors);
}

fn validate_protocol(config: &toml::Value, errors: &mut Vec<String>) {
    check_section(
        config,
        "protocol",
        &[("mode", is_mode), ("scan_interval_ms", is_positive_u32)],
        errors,
    );
}

fn validate_session(config: &toml::Value, errors: &mut Vec<String>) {
    check_section(config, "session", &[("idle_poll_us", is_u32)], errors);
}

fn validate_known_sections(config: &toml::Value, errors: &mut Vec<String>) {
    const KNOWN: [&str; 5] = ["network", "link", "keyboard", "protocol", "session"];
    let Some(root) = config.as_table() else {
        return;
    };
    for (name, value) in root {
        if !KNOWN.contains(&name.as_str()) {
            errors.push(format!("unknown section [{}]", name));
        } else if !value.is_table() {
            errors.push(format!("{} must be a [section]", name));
        }
    }
}

/// The radio firmware is included with `include_bytes!`
fn check_radio_firmware() {
    let missing: Vec<&str> = RADIO_BLOBS
        .iter()
        .copied()
        .filter(|path| {
            println!("cargo:rerun-if-changed={}", path);
            !Path::new(path).exists()
        })
        .collect();

    if !missing.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: CYW43 radio firmware missing                             ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ║  See cyw43-firmware/README.md                                    ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            missing
                .iter()
                .map(|m| format!("║  • {:<62} ║", m))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}
