use serde::Serialize;

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub lines_in: u64,
    pub empty_lines: u64,
    pub partitions: u64,
    pub entries_out: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub inputs: u64,
    pub entries_in: u64,
    pub entries_out: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub level: u64,
    pub partitions_in: u64,
    pub merges: u64,
    pub passed_through: u64,
    pub entries_in: u64,
    pub entries_out: u64,
    pub min_merge_ms: u64,
    pub max_merge_ms: u64,
    pub wall_ms: u64,
}

impl LevelStats {
    pub fn record_merge(&mut self, merge: &MergeStats) {
        if self.merges == 0 {
            self.min_merge_ms = merge.wall_ms;
        } else {
            self.min_merge_ms = self.min_merge_ms.min(merge.wall_ms);
        }
        self.max_merge_ms = self.max_merge_ms.max(merge.wall_ms);
        self.merges += 1;
        self.entries_in += merge.entries_in;
        self.entries_out += merge.entries_out;
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReduceStats {
    pub levels: Vec<LevelStats>,
    pub merges: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub build: BuildStats,
    pub reduce: ReduceStats,
    pub wall_ms: u64,
}

impl RunStats {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
