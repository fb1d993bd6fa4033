use crate::domain::ToleranceRange;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseCommand {
    pub text: String,
    pub source_line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandCase {
    pub case_id: String,
    pub header_line: usize,
    pub commands: Vec<CaseCommand>,
    pub meta: BTreeMap<String, String>,
    pub skip_pairs: Vec<(String, String)>,
    pub policy: TolerancePolicy,
}

impl CommandCase {
    pub fn skips_pair(&self, first: &str, second: &str) -> bool {
        self.skip_pairs
            .iter()
            .any(|(a, b)| (a == first && b == second) || (a == second && b == first))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    pub need_int: bool,
    pub need_force: bool,
    pub need_torque: bool,
    pub need_mueller: bool,
}

impl FeatureFlags {
    pub fn needs_field_amplitude(&self) -> bool {
        self.need_int || self.need_force || self.need_torque
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TolerancePolicy {
    pub ext: ToleranceRange,
    pub abs: ToleranceRange,
    pub res: ToleranceRange,
    pub int: Option<ToleranceRange>,
    pub force: Option<ToleranceRange>,
    pub torque: Option<ToleranceRange>,
    pub mueller: Option<ToleranceRange>,
    pub flags: FeatureFlags,
}

impl TolerancePolicy {
    pub fn force_range(&self) -> ToleranceRange {
        self.force.unwrap_or(ToleranceRange::PERMISSIVE)
    }

    pub fn torque_range(&self) -> ToleranceRange {
        self.torque.unwrap_or(ToleranceRange::PERMISSIVE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CaseTag {
    Tolerance(ToleranceTag),
    SkipPairs,
    Flag(FeatureFlag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ToleranceTag {
    Tol,
    Ext,
    Abs,
    Res,
    Int,
    Force,
    Torque,
    Mueller,
}

impl ToleranceTag {
    pub(super) const fn key(self) -> &'static str {
        match self {
            Self::Tol => "tol",
            Self::Ext => "tol_ext",
            Self::Abs => "tol_abs",
            Self::Res => "tol_res",
            Self::Int => "tol_int",
            Self::Force => "tol_force",
            Self::Torque => "tol_torque",
            Self::Mueller => "tol_mueller",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FeatureFlag {
    Int,
    Force,
    Torque,
    Mueller,
}

impl FeatureFlag {
    pub(super) const fn key(self) -> &'static str {
        match self {
            Self::Int => "need_int",
            Self::Force => "need_force",
            Self::Torque => "need_torque",
            Self::Mueller => "need_mueller",
        }
    }

    pub(super) const fn tolerance(self) -> ToleranceTag {
        match self {
            Self::Int => ToleranceTag::Int,
            Self::Force => ToleranceTag::Force,
            Self::Torque => ToleranceTag::Torque,
            Self::Mueller => ToleranceTag::Mueller,
        }
    }
}

impl CaseTag {
    pub(super) fn from_name(name: &str) -> Option<Self> {
        let tag = match name {
            "tol" => Self::Tolerance(ToleranceTag::Tol),
            "tol_ext" => Self::Tolerance(ToleranceTag::Ext),
            "tol_abs" => Self::Tolerance(ToleranceTag::Abs),
            "tol_res" => Self::Tolerance(ToleranceTag::Res),
            "tol_int" => Self::Tolerance(ToleranceTag::Int),
            "tol_force" => Self::Tolerance(ToleranceTag::Force),
            "tol_torque" => Self::Tolerance(ToleranceTag::Torque),
            "tol_mueller" => Self::Tolerance(ToleranceTag::Mueller),
            "skip_pairs" => Self::SkipPairs,
            "need_int" => Self::Flag(FeatureFlag::Int),
            "need_force" => Self::Flag(FeatureFlag::Force),
            "need_torque" => Self::Flag(FeatureFlag::Torque),
            "need_mueller" => Self::Flag(FeatureFlag::Mueller),
            _ => return None,
        };
        Some(tag)
    }
}
