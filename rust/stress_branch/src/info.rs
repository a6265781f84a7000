// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::fmt;

use crate::context::StressContext;

/// Exit status a stressor hands back to its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StressExit {
    Success = 0,
    Failure = 1,
    NotImplemented = 4,
}

impl StressExit {
    pub fn exit_code(&self) -> i32 {
        *self as i32
    }

    /// The stressor could not run on this system. Hosts should skip it
    /// rather than treat it as a failure.
    pub fn is_skip(&self) -> bool {
        *self == Self::NotImplemented
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::NotImplemented => "not implemented",
        }
    }
}

impl fmt::Display for StressExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad category a stressor belongs to, used by hosts to select groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StressClass {
    Cpu,
}

impl StressClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
        }
    }
}

/// One line of stressor help: option and what it does.
#[derive(Clone, Copy, Debug)]
pub struct Help {
    pub opt_s: Option<&'static str>,
    pub opt_l: &'static str,
    pub description: &'static str,
}

pub type Stressor = fn(&mut dyn StressContext) -> StressExit;

/// Registration record a host uses to list and launch a stressor.
#[derive(Clone, Copy)]
pub struct StressorInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub class: StressClass,
    pub help: &'static [Help],
    pub stressor: Stressor,
}

impl fmt::Debug for StressorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StressorInfo")
            .field("name", &self.name)
            .field("class", &self.class)
            .finish()
    }
}

impl StressorInfo {
    pub fn run(&self, ctx: &mut dyn StressContext) -> StressExit {
        (self.stressor)(ctx)
    }

    /// Help table, one option per line, aligned like a usage message.
    pub fn help_text(&self) -> String {
        let width = self.help.iter().map(|h| h.opt_l.len()).max().unwrap_or(0);
        let mut out = String::new();
        for h in self.help {
            let short = h.opt_s.map(|s| format!("-{}", s)).unwrap_or_default();
            out.push_str(&format!(
                "{:>4} --{:<width$}  {}\n",
                short,
                h.opt_l,
                h.description,
                width = width
            ));
        }
        out
    }
}

/// Fallback entry for builds without indirect dispatch.
pub fn stress_not_implemented(_ctx: &mut dyn StressContext) -> StressExit {
    StressExit::NotImplemented
}

const BRANCH_HELP: &[Help] = &[
    Help {
        opt_s: None,
        opt_l: "branch N",
        description: "start N workers that force branch misprediction",
    },
    Help {
        opt_s: None,
        opt_l: "branch-ops N",
        description: "stop after N branch misprediction branches",
    },
];

#[cfg(feature = "indirect-dispatch")]
const BRANCH_ENTRY: Stressor = crate::engine::stress_branch;
#[cfg(not(feature = "indirect-dispatch"))]
const BRANCH_ENTRY: Stressor = stress_not_implemented;

pub const STRESS_BRANCH_INFO: StressorInfo = StressorInfo {
    name: "branch",
    description: "force branch misprediction with a 1024-way indirect dispatch chain",
    class: StressClass::Cpu,
    help: BRANCH_HELP,
    stressor: BRANCH_ENTRY,
};
