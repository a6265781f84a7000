// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

// Generates the dispatch table: one entry per node, the gate at index 0 and
// a distinct monomorphized plain node for every other index.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

const NR_NODES: usize = 1024;
const PER_LINE: usize = 8;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    let mut src = String::new();
    writeln!(src, "// @generated by build.rs. Do not edit.").unwrap();
    writeln!(src, "pub(crate) const GENERATED_NODES: usize = {};", NR_NODES).unwrap();
    writeln!(src, "pub(crate) static NODES: [Node; {}] = [", NR_NODES).unwrap();

    for row in (0..NR_NODES).step_by(PER_LINE) {
        src.push_str("   ");
        for idx in row..(row + PER_LINE).min(NR_NODES) {
            if idx == 0 {
                src.push_str(" gate,");
            } else {
                write!(src, " node::<0x{:03x}>,", idx).unwrap();
            }
        }
        src.push('\n');
    }
    writeln!(src, "];").unwrap();

    fs::write(out_dir.join("nodes.rs"), src).expect("failed to write nodes.rs");
    println!("cargo:rerun-if-changed=build.rs");
}
