//! Parser for EDK2 module information (INF) files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Module types a library supports when it declares no phases (or `BASE`).
pub const ALL_PHASES: &[&str] = &[
    "SEC",
    "PEIM",
    "PEI_CORE",
    "DXE_DRIVER",
    "DXE_CORE",
    "DXE_RUNTIME_DRIVER",
    "UEFI_DRIVER",
    "SMM_CORE",
    "DXE_SMM_DRIVER",
    "UEFI_APPLICATION",
];

/// Parsed contents of a single INF file, independent of any DSC context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfFile {
    pub path: PathBuf,
    /// `KEY = VALUE` pairs from the `[Defines]` section.
    pub defines: BTreeMap<String, String>,
    pub library_class: Option<String>,
    pub supported_phases: Vec<String>,
    pub packages: Vec<String>,
    pub libraries: Vec<String>,
    pub protocols: Vec<String>,
    pub guids: Vec<String>,
    pub ppis: Vec<String>,
    pub pcds: Vec<String>,
    pub sources: Vec<String>,
    pub binaries: Vec<String>,
}

impl InfFile {
    pub fn file_guid(&self) -> Option<&str> {
        self.define("FILE_GUID")
    }

    pub fn base_name(&self) -> Option<&str> {
        self.define("BASE_NAME")
    }

    pub fn module_type(&self) -> Option<&str> {
        self.define("MODULE_TYPE")
    }

    /// Case-insensitive lookup into `[Defines]`.
    pub fn define(&self, key: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Defines,
    Packages,
    LibraryClasses,
    Protocols,
    Guids,
    Ppis,
    Pcds,
    Sources,
    Binaries,
    Other,
}

impl Section {
    fn from_header(header: &str) -> Self {
        let name = header
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim()
            .to_ascii_lowercase();

        let starts = |prefix: &str| name.starts_with(prefix);
        if starts("defines") {
            Section::Defines
        } else if starts("packages") {
            Section::Packages
        } else if starts("libraryclasses") {
            Section::LibraryClasses
        } else if starts("protocols") {
            Section::Protocols
        } else if starts("ppis") {
            Section::Ppis
        } else if starts("guids") {
            Section::Guids
        } else if starts("pcd") || starts("patchpcd") || starts("fixedpcd") || starts("featurepcd") {
            Section::Pcds
        } else if starts("sources") {
            Section::Sources
        } else if starts("binaries") {
            Section::Binaries
        } else {
            Section::Other
        }
    }
}

/// Read and parse the INF file at `path`.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so
/// UTF-16 Windows driver INFs parse to an entry without a `FILE_GUID`.
pub fn parse_inf(path: &Path) -> Result<InfFile> {
    let bytes = std::fs::read(path).map_err(|err| Error::io(path, err))?;
    let mut inf = parse_inf_str(&String::from_utf8_lossy(&bytes));
    inf.path = path.to_path_buf();
    Ok(inf)
}

/// Parse INF text. The returned value has an empty `path`.
pub fn parse_inf_str(contents: &str) -> InfFile {
    let mut inf = InfFile::default();
    let mut section = Section::None;

    for raw in contents.lines() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            section = Section::from_header(line);
            continue;
        }

        match section {
            Section::Defines => parse_define(&mut inf, line),
            Section::Packages => inf.packages.push(first_field(line)),
            Section::LibraryClasses => inf.libraries.push(first_field(line)),
            Section::Protocols => inf.protocols.push(first_field(line)),
            Section::Guids => inf.guids.push(first_field(line)),
            Section::Ppis => inf.ppis.push(first_field(line)),
            Section::Pcds => inf.pcds.push(first_field(line)),
            Section::Sources => inf.sources.push(first_field(line)),
            Section::Binaries => inf.binaries.push(first_field(line)),
            Section::None | Section::Other => {}
        }
    }

    inf
}

fn parse_define(inf: &mut InfFile, line: &str) {
    if line.matches('=').count() != 1 {
        return;
    }
    let Some((key, value)) = line.split_once('=') else {
        return;
    };
    let key = key.trim();
    let value = value.trim();

    if key.eq_ignore_ascii_case("LIBRARY_CLASS") {
        let (class, phases) = value.split_once('|').unwrap_or((value, ""));
        let phases = phases.trim();
        inf.library_class = Some(class.trim().to_string());
        inf.supported_phases = if phases.is_empty() || phases.eq_ignore_ascii_case("base") {
            ALL_PHASES.iter().map(|phase| phase.to_string()).collect()
        } else {
            phases.split_whitespace().map(str::to_string).collect()
        };
    }

    inf.defines.insert(key.to_string(), value.to_string());
}

fn first_field(line: &str) -> String {
    line.split('|').next().unwrap_or(line).trim().to_string()
}

/// Drop a trailing `#` comment, ignoring `#` inside quoted strings.
fn strip_comment(line: &str) -> &str {
    if !line.contains('#') {
        return line.trim();
    }

    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '\\' if !escaped => {
                escaped = true;
                continue;
            }
            '"' | '\'' if !escaped => match quote {
                None => quote = Some(ch),
                Some(open) if open == ch => quote = None,
                Some(_) => {}
            },
            '#' if quote.is_none() => return line[..idx].trim(),
            _ => {}
        }
        escaped = false;
    }
    line.trim()
}
