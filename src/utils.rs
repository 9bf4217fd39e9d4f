// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod path;

/// Names that user code cannot bind.
pub const RESERVED_NAMES: [&str; 27] = [
    "action", "and", "args", "bool", "builddir", "buildroot", "false", "fields", "file", "files",
    "function", "import", "in", "int", "list", "nil", "not", "or", "out", "print", "record",
    "srcroot", "string", "true", "type", "typeof", "xor",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.binary_search(&name).is_ok()
}

/// Append `name` to a dotted value path such as `compilers.cc`.
pub fn dotted(prefix: &str, name: &str) -> String {
    match prefix.is_empty() {
        true => name.to_string(),
        false => format!("{prefix}.{name}"),
    }
}
