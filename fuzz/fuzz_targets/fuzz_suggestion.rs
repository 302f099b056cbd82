// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::path::PathBuf;

use quantum_organizer::advisor::FileChange;

#[derive(Arbitrary, Debug)]
struct Input {
    file_name: String,
    new_path: String,
}

fuzz_target!(|input: Input| {
    let original = PathBuf::from("/scan/root").join(input.file_name.replace('/', "_"));
    let change = FileChange {
        original_path: original.clone(),
        new_path: input.new_path,
        reason: String::new(),
        tags: Vec::new(),
    };

    // Accepted suggestions must stay under the original file's directory.
    if let Ok(op) = change.to_operation() {
        let parent = original.parent().unwrap();
        assert!(op.destination_path.starts_with(parent));
        assert_ne!(op.destination_path, parent);
    }
});
