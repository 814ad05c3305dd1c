use std::fmt;

use super::setting::ModelSetting;

/// Progress of the asset loading pipeline.
///
/// Stages run strictly in declaration order. Optional stages whose resource is
/// absent from the settings document are skipped by [`LoadStage::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    LoadSettings,
    LoadModelGeometry,
    LoadExpressions,
    LoadPhysics,
    LoadPose,
    SetupEyeBlink,
    SetupBreath,
    LoadUserData,
    SetupEyeBlinkIds,
    SetupLipSyncIds,
    SetupLayout,
    LoadMotions,
    LoadTextures,
    CompleteSetup,
    /// A fatal failure occurred; never drawable
    Failed,
}

const SEQUENCE: [LoadStage; 14] = [
    LoadStage::LoadSettings,
    LoadStage::LoadModelGeometry,
    LoadStage::LoadExpressions,
    LoadStage::LoadPhysics,
    LoadStage::LoadPose,
    LoadStage::SetupEyeBlink,
    LoadStage::SetupBreath,
    LoadStage::LoadUserData,
    LoadStage::SetupEyeBlinkIds,
    LoadStage::SetupLipSyncIds,
    LoadStage::SetupLayout,
    LoadStage::LoadMotions,
    LoadStage::LoadTextures,
    LoadStage::CompleteSetup,
];

impl LoadStage {
    /// Whether this stage has work to do for `setting`
    pub fn applies_to(self, setting: &ModelSetting) -> bool {
        match self {
            LoadStage::LoadExpressions => setting.expression_count() > 0,
            LoadStage::LoadPhysics => setting.physics_file_name().is_some(),
            LoadStage::LoadPose => setting.pose_file_name().is_some(),
            LoadStage::LoadUserData => setting.user_data_file_name().is_some(),
            LoadStage::LoadMotions => setting.motion_group_count() > 0,
            LoadStage::Failed => false,
            _ => true,
        }
    }

    /// The stage that follows this one for `setting`. Terminal stages map to themselves.
    pub fn next(self, setting: &ModelSetting) -> LoadStage {
        if self.is_terminal() {
            return self;
        }
        let position = SEQUENCE.iter().position(|stage| *stage == self).unwrap_or(0);
        SEQUENCE[position + 1..]
            .iter()
            .copied()
            .find(|stage| stage.applies_to(setting))
            .unwrap_or(LoadStage::CompleteSetup)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoadStage::CompleteSetup | LoadStage::Failed)
    }

    pub fn is_drawable(self) -> bool {
        self == LoadStage::CompleteSetup
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStage::LoadSettings => "LoadSettings",
            LoadStage::LoadModelGeometry => "LoadModelGeometry",
            LoadStage::LoadExpressions => "LoadExpressions",
            LoadStage::LoadPhysics => "LoadPhysics",
            LoadStage::LoadPose => "LoadPose",
            LoadStage::SetupEyeBlink => "SetupEyeBlink",
            LoadStage::SetupBreath => "SetupBreath",
            LoadStage::LoadUserData => "LoadUserData",
            LoadStage::SetupEyeBlinkIds => "SetupEyeBlinkIds",
            LoadStage::SetupLipSyncIds => "SetupLipSyncIds",
            LoadStage::SetupLayout => "SetupLayout",
            LoadStage::LoadMotions => "LoadMotions",
            LoadStage::LoadTextures => "LoadTextures",
            LoadStage::CompleteSetup => "CompleteSetup",
            LoadStage::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// Completed/total counter for a fan-out stage. Opens exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGate {
    total: usize,
    completed: usize,
    opened: bool,
}

impl StageGate {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            opened: false,
        }
    }

    /// Record one item resolving. A failed item shrinks the expected total
    /// instead of counting as completed. Returns true only on the call that opens the gate.
    pub fn resolve(&mut self, succeeded: bool) -> bool {
        if succeeded {
            self.completed += 1;
        } else {
            self.total = self.total.saturating_sub(1);
        }
        self.try_open()
    }

    /// Opens an empty gate
    pub fn try_open(&mut self) -> bool {
        if !self.opened && self.completed >= self.total {
            self.opened = true;
            return true;
        }
        false
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }
}
