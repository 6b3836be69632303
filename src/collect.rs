// enveye is a tool for comparing application environment snapshots
// Copyright (C) 2025  Peoples Grocers LLC
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// To purchase a license under different terms contact admin@peoplesgrocers.com
// To request changes, report bugs, or give user feedback contact
// marxism@peoplesgrocers.com
//

//! Building a snapshot document on the local host.
//!
//! Every fact is gathered independently. A fact that cannot be read ends up
//! in the snapshot as an error value (and as a warning diagnostic) instead of
//! aborting the collection, because a half-complete snapshot still diffs
//! usefully against a healthy one.

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollector};
use crate::snapshot::CONTEXT_KEY;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_REGISTRY_KEYS: &[&str] = &["HKEY_LOCAL_MACHINE\\SOFTWARE\\SampleApp\\Settings"];
pub const DEFAULT_SERVICES: &[&str] = &["MSSQL$SQLEXPRESS", "W3SVC"];
pub const DEFAULT_ENV_VARS: &[&str] = &["APP_ENV", "ENVIRONMENT"];

const DOTNET_VERSIONS_SCRIPT: &str = "Get-ChildItem 'HKLM:\\SOFTWARE\\Microsoft\\NET Framework Setup\\NDP' -Recurse | \
     Get-ItemProperty -Name Version -ErrorAction SilentlyContinue | \
     Where { $_.PSChildName -match '^(?!S)\\p{L}'} | \
     Select-Object -ExpandProperty Version";
const OS_VERSION_SCRIPT: &str = "(Get-CimInstance Win32_OperatingSystem).Version";
const OS_BUILD_SCRIPT: &str = "(Get-CimInstance Win32_OperatingSystem).BuildNumber";

/// Runs a script and returns its standard output.
pub trait Shell {
    fn run(&self, script: &str) -> Result<String, String>;
}

pub struct PowerShell;

impl Shell for PowerShell {
    fn run(&self, script: &str) -> Result<String, String> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .map_err(|e| format!("couldn't start powershell: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "powershell exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    Desktop,
    Web,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Desktop => "desktop",
            AppType::Web => "web",
        }
    }
}

impl FromStr for AppType {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(AppType::Desktop),
            "web" => Ok(AppType::Web),
            other => Err(Diagnostic::fatal(
                DiagnosticCode::InvalidFlag,
                format!("I don't know the application type '{}'.", other),
            )
            .with_advice("Use --app-type desktop or --app-type web.".to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub app_folder: PathBuf,
    pub app_type: AppType,
    pub registry_keys: Vec<String>,
    pub services: Vec<String>,
    pub env_vars: Vec<String>,
}

impl CollectRequest {
    /// A request using the stock registry keys, services and variables.
    pub fn new(app_folder: PathBuf, app_type: AppType) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            app_folder,
            app_type,
            registry_keys: owned(DEFAULT_REGISTRY_KEYS),
            services: owned(DEFAULT_SERVICES),
            env_vars: owned(DEFAULT_ENV_VARS),
        }
    }
}

pub struct Collector<'a> {
    shell: &'a dyn Shell,
    env: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> Collector<'a> {
    pub fn new(shell: &'a dyn Shell, env: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { shell, env }
    }

    pub fn collect(
        &self,
        request: &CollectRequest,
        diagnostics: &mut DiagnosticCollector,
    ) -> Result<Value, Diagnostic> {
        if !request.app_folder.is_dir() {
            return Err(Diagnostic::fatal(
                DiagnosticCode::AppFolderNotFound,
                format!(
                    "The application folder {} does not exist.",
                    request.app_folder.display()
                ),
            ));
        }

        let app_config_settings = match find_config_file(&request.app_folder, request.app_type) {
            Some(path) => read_app_config(&path, diagnostics),
            None => {
                diagnostics.add(Diagnostic::warning(
                    DiagnosticCode::ConfigFileMissing,
                    format!(
                        "I couldn't find a config file for the {} app in {}.",
                        request.app_type.as_str(),
                        request.app_folder.display()
                    ),
                ));
                Value::Object(Map::new())
            }
        };

        let mut context = Map::new();
        context.insert("os_info".to_string(), self.os_info(diagnostics));
        context.insert(
            "dotnet_frameworks_installed".to_string(),
            self.dotnet_versions(diagnostics),
        );
        context.insert(
            "app_folder_dlls".to_string(),
            self.dll_versions(&request.app_folder, diagnostics),
        );
        context.insert("app_config_settings".to_string(), app_config_settings);
        context.insert(
            "critical_registry_keys".to_string(),
            self.registry_keys(&request.registry_keys, diagnostics),
        );
        context.insert(
            "required_services_status".to_string(),
            self.services(&request.services, diagnostics),
        );
        context.insert(
            "critical_environment_variables".to_string(),
            self.environment_variables(&request.env_vars),
        );

        let application_name = request
            .app_folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut document = Map::new();
        document.insert("snapshot_id".to_string(), json!(Uuid::new_v4()));
        document.insert("application_name".to_string(), json!(application_name));
        document.insert(
            "application_type".to_string(),
            json!(request.app_type.as_str()),
        );
        document.insert(CONTEXT_KEY.to_string(), Value::Object(context));
        document.insert(
            "timestamp".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        Ok(Value::Object(document))
    }

    fn query(&self, fact: &str, script: &str, diagnostics: &mut DiagnosticCollector) -> Option<String> {
        match self.shell.run(script) {
            Ok(output) => Some(output.trim().to_string()),
            Err(message) => {
                tracing::warn!(fact, error = %message, "fact collection failed");
                diagnostics.add(Diagnostic::warning(
                    DiagnosticCode::FactCollectionFailed,
                    format!("I couldn't read {}: {}", fact, message),
                ));
                None
            }
        }
    }

    fn os_info(&self, diagnostics: &mut DiagnosticCollector) -> Value {
        let name = match std::env::consts::OS {
            "windows" => "Windows".to_string(),
            "linux" => "Linux".to_string(),
            "macos" => "Darwin".to_string(),
            other => other.to_string(),
        };
        let version = self
            .query("the OS version", OS_VERSION_SCRIPT, diagnostics)
            .unwrap_or_else(|| "Unknown".to_string());
        let build = self
            .query("the OS build", OS_BUILD_SCRIPT, diagnostics)
            .unwrap_or_else(|| "Unknown".to_string());

        json!({
            "name": name,
            "version": version,
            "build": build,
            "architecture": std::env::consts::ARCH,
        })
    }

    fn dotnet_versions(&self, diagnostics: &mut DiagnosticCollector) -> Value {
        match self.shell.run(DOTNET_VERSIONS_SCRIPT) {
            Ok(output) => Value::Array(
                output
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| json!(line))
                    .collect(),
            ),
            Err(message) => {
                diagnostics.add(Diagnostic::warning(
                    DiagnosticCode::FactCollectionFailed,
                    format!("I couldn't read the installed .NET versions: {}", message),
                ));
                json!([format!("Error retrieving .NET versions: {}", message)])
            }
        }
    }

    fn dll_versions(&self, folder: &Path, diagnostics: &mut DiagnosticCollector) -> Value {
        let entries = match fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(e) => {
                diagnostics.add(Diagnostic::warning(
                    DiagnosticCode::FactCollectionFailed,
                    format!("I couldn't list {}: {}", folder.display(), e),
                ));
                return json!({"error": e.to_string()});
            }
        };

        let mut dlls: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.to_ascii_lowercase()
                    .ends_with(".dll")
                    .then(|| (name, entry.path()))
            })
            .collect();
        dlls.sort();

        let mut versions = Map::new();
        for (name, path) in dlls {
            let quoted = powershell_quote(&path.display().to_string());
            let file_version = self
                .shell
                .run(&format!("(Get-Item {}).VersionInfo.FileVersion", quoted));
            let assembly_version = self.shell.run(&format!(
                "([Reflection.AssemblyName]::GetAssemblyName({})).Version.ToString()",
                quoted
            ));

            let entry = match (file_version, assembly_version) {
                (Ok(file), Ok(assembly)) => json!({
                    "file_version": file.trim(),
                    "assembly_version": assembly.trim(),
                }),
                (Err(message), _) | (_, Err(message)) => {
                    tracing::warn!(dll = %name, error = %message, "dll version lookup failed");
                    json!({
                        "file_version": "Unknown",
                        "assembly_version": "Unknown",
                        "error": message,
                    })
                }
            };
            versions.insert(name, entry);
        }
        Value::Object(versions)
    }

    fn registry_keys(&self, keys: &[String], diagnostics: &mut DiagnosticCollector) -> Value {
        let mut registry = Map::new();
        for key in keys {
            let script = format!(
                "Get-ItemProperty -Path {} | Select-Object *",
                powershell_quote(&registry_provider_path(key))
            );
            let value = match self.shell.run(&script) {
                Ok(output) => Value::Object(parse_property_listing(&output)),
                Err(message) => {
                    diagnostics.add(Diagnostic::warning(
                        DiagnosticCode::FactCollectionFailed,
                        format!("I couldn't read the registry key {}: {}", key, message),
                    ));
                    json!({"error": message})
                }
            };
            registry.insert(key.clone(), value);
        }
        Value::Object(registry)
    }

    fn services(&self, services: &[String], diagnostics: &mut DiagnosticCollector) -> Value {
        let mut status = Map::new();
        for service in services {
            let script = format!("(Get-Service -Name {}).Status", powershell_quote(service));
            let value = self
                .query(&format!("the status of service {}", service), &script, diagnostics)
                .unwrap_or_else(|| "Service not found or error".to_string());
            status.insert(service.clone(), json!(value));
        }
        Value::Object(status)
    }

    fn environment_variables(&self, names: &[String]) -> Value {
        let mut vars = Map::new();
        for name in names {
            let value = (self.env)(name).unwrap_or_else(|| "Not Set".to_string());
            vars.insert(name.clone(), json!(value));
        }
        Value::Object(vars)
    }
}

/// Desktop apps keep settings in `<name>.exe.config`, web apps in `web.config`.
pub fn find_config_file(app_folder: &Path, app_type: AppType) -> Option<PathBuf> {
    match app_type {
        AppType::Desktop => {
            let mut candidates: Vec<PathBuf> = fs::read_dir(app_folder)
                .ok()?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.ends_with(".exe.config"))
                        .unwrap_or(false)
                })
                .collect();
            candidates.sort();
            candidates.into_iter().next()
        }
        AppType::Web => {
            let path = app_folder.join("web.config");
            path.exists().then_some(path)
        }
    }
}

/// Reads `appSettings` and `connectionStrings` out of a .NET config file.
pub fn read_app_config(path: &Path, diagnostics: &mut DiagnosticCollector) -> Value {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            diagnostics.add(Diagnostic::warning(
                DiagnosticCode::FactCollectionFailed,
                format!("I couldn't read {}: {}", path.display(), e),
            ));
            return json!({"error": e.to_string()});
        }
    };

    let document = match roxmltree::Document::parse(&text) {
        Ok(document) => document,
        Err(e) => {
            diagnostics.add(Diagnostic::warning(
                DiagnosticCode::FactCollectionFailed,
                format!("I couldn't parse {} as XML: {}", path.display(), e),
            ));
            return json!({"error": e.to_string()});
        }
    };

    let mut app_settings = Map::new();
    let mut connection_strings = Map::new();

    for node in document.descendants().filter(|n| n.has_tag_name("add")) {
        let parent = match node.parent_element() {
            Some(parent) => parent,
            None => continue,
        };

        if parent.has_tag_name("appSettings") {
            if let Some(key) = node.attribute("key") {
                app_settings.insert(key.to_string(), json!(node.attribute("value")));
            }
        } else if parent.has_tag_name("connectionStrings") {
            if let Some(name) = node.attribute("name") {
                connection_strings.insert(
                    name.to_string(),
                    json!(node.attribute("connectionString")),
                );
            }
        }
    }

    json!({
        "app_settings": app_settings,
        "connection_strings": connection_strings,
    })
}

/// Parses `Name : Value` lines as printed by `Select-Object *`.
pub fn parse_property_listing(output: &str) -> Map<String, Value> {
    let mut props = Map::new();
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                props.insert(key.to_string(), json!(value.trim()));
            }
        }
    }
    props
}

fn registry_provider_path(key: &str) -> String {
    if key.starts_with("HKEY_") {
        format!("Registry::{}", key)
    } else {
        key.to_string()
    }
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
