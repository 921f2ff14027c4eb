#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use edk2db::tables::{InfTable, InfTableOptions, SourceTable, SourceTableOptions};
use edk2db::{Edk2Db, Edk2Path};

pub const DEBUG_LIB_INF: &str = "\
[Defines]
  INF_VERSION    = 0x00010005
  BASE_NAME      = DebugLibNull
  FILE_GUID      = 1A2B3C4D-0000-4000-8000-000000000001
  MODULE_TYPE    = BASE
  LIBRARY_CLASS  = DebugLib

[Sources]
  DebugLib.c

[Packages]
  TestPkg/TestPkg.dec
";

pub const UNUSED_LIB_INF: &str = "\
[Defines]
  INF_VERSION    = 0x00010005
  BASE_NAME      = UnusedLib
  FILE_GUID      = 1A2B3C4D-0000-4000-8000-000000000002
  MODULE_TYPE    = BASE
  LIBRARY_CLASS  = UnusedLib|DXE_DRIVER

[Sources]
  Unused.c
";

pub const DRIVER_INF: &str = "\
[Defines]
  INF_VERSION    = 0x00010005
  BASE_NAME      = TestDriver
  FILE_GUID      = 1A2B3C4D-0000-4000-8000-000000000003
  MODULE_TYPE    = DXE_DRIVER
  ENTRY_POINT    = DriverEntry

[Sources]
  Driver.c
  ../Common/Shared.c

[LibraryClasses]
  DebugLib
  BaseLib
";

pub const WINDOWS_INF: &str = "\
[Version]
Signature   = \"$WINDOWS NT$\"
Class       = Net
";

pub const LICENSED: &str = "/** @file\n  SPDX-License-Identifier: BSD-2-Clause-Patent\n**/\n\nint Value = 1;\n";
pub const UNLICENSED: &str = "int Value = 2;\n";

/// Fresh directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("edk2db_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(path, contents).expect("write fixture file");
}

/// Small EDK2 workspace with one package, two libraries, one driver, a
/// non-EDK2 INF and a `Build` directory that must be ignored.
pub fn fixture_workspace(label: &str) -> PathBuf {
    let root = temp_dir(label);
    write(&root, "TestPkg/TestPkg.dec", "[Defines]\n  PACKAGE_NAME = TestPkg\n");
    write(&root, "TestPkg/Library/DebugLibNull/DebugLibNull.inf", DEBUG_LIB_INF);
    write(&root, "TestPkg/Library/DebugLibNull/DebugLib.c", LICENSED);
    write(&root, "TestPkg/Library/UnusedLib/UnusedLib.inf", UNUSED_LIB_INF);
    write(&root, "TestPkg/Library/UnusedLib/Unused.c", UNLICENSED);
    write(&root, "TestPkg/Driver/Driver.inf", DRIVER_INF);
    write(&root, "TestPkg/Driver/Driver.c", UNLICENSED);
    write(&root, "TestPkg/Common/Shared.c", LICENSED);
    write(&root, "TestPkg/Windows/netdrv.inf", WINDOWS_INF);
    write(&root, "Build/X64/Generated.c", UNLICENSED);
    write(&root, "Build/X64/Generated.inf", DRIVER_INF);
    root
}

pub fn edk2_path(root: &Path) -> Edk2Path {
    Edk2Path::new(root, Vec::<PathBuf>::new()).expect("workspace resolver")
}

/// In-memory database over `root` with the source and INF generators
/// registered, using a small worker pool.
pub async fn workspace_db(root: &Path) -> Edk2Db {
    let mut db = Edk2Db::open_in_memory(Some(edk2_path(root)))
        .await
        .expect("open in-memory db");
    db.register(SourceTable::new(SourceTableOptions {
        jobs: 2,
        ..SourceTableOptions::default()
    }))
    .register(InfTable::new(InfTableOptions { jobs: 2 }));
    db
}
