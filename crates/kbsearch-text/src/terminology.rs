//! Synonym-table query expansion for rail maintenance (EMU800) vocabulary.
//!
//! Matching is by case-insensitive substring, so it works on unsegmented CJK
//! queries. Expansion is single-hop: a synonym never pulls in the synonyms of
//! another entry.

use std::collections::HashMap;

/// Maintenance actions recognised by [`TerminologyExpander::extract_actions`].
pub const ACTION_TERMS: &[&str] = &["拆卸", "組裝", "檢修", "量測", "更新", "敲診"];

const RAIL_TERMINOLOGY: &[(&str, &[&str])] = &[
    // bogie
    ("轉向架", &["bogie", "台車", "走行部", "轉向架總成"]),
    ("牽引馬達", &["traction motor", "驅動馬達", "電動機", "牽引電機"]),
    ("空氣彈簧", &["air spring", "空簧", "皮囊", "氣墊"]),
    ("軔缸", &["brake cylinder", "煞車缸", "制動缸"]),
    ("碟煞", &["disc brake", "碟式煞車", "碟煞盤"]),
    ("軸箱", &["axle box", "軸承箱"]),
    ("車輪", &["wheel", "輪對", "車輪組"]),
    ("齒輪箱", &["gear box", "減速箱", "齒輪傳動箱"]),
    // couplers
    ("連結器", &["coupler", "車鉤", "聯結器"]),
    ("密著式連結器", &["tight-lock coupler", "密連", "密著連結器"]),
    ("緩衝器", &["buffer", "緩衝橡皮", "緩衝裝置"]),
    // brakes
    ("煞車", &["brake", "制動", "軔機"]),
    ("閘瓦", &["brake shoe", "煞車片", "制動塊"]),
    ("踏面清潔裝置", &["tread cleaner", "踏面清潔器"]),
    // air system
    ("空壓機", &["compressor", "壓縮機", "空氣壓縮機"]),
    ("司軔閥", &["driver's brake valve", "司機制動閥"]),
    ("MR", &["main reservoir", "主風缸", "總風缸"]),
    ("BP", &["brake pipe", "制動管", "列車管"]),
    // electrical
    ("集電弓", &["pantograph", "受電弓"]),
    ("主變壓器", &["main transformer", "主變"]),
    ("輔助電源", &["auxiliary power supply", "SIV", "靜態變流器"]),
    // car body
    ("車身", &["car body", "車體", "車殼"]),
    ("中心銷", &["center pin", "中心盤", "回轉盤"]),
    ("牽引桿", &["traction link", "牽引裝置"]),
    // actions
    ("拆卸", &["disassemble", "拆除", "分解", "卸下"]),
    ("組裝", &["assemble", "安裝", "裝配", "鎖固"]),
    ("檢修", &["inspection", "維修", "檢查", "保養"]),
    ("量測", &["measure", "測量", "量測"]),
    ("更新", &["replace", "更換", "換新"]),
    ("敲診", &["tap test", "敲擊測試", "敲打檢查"]),
    // tools
    ("套筒", &["socket", "套筒扳手"]),
    ("梅開板手", &["open-end wrench", "開口扳手"]),
    ("空氣槍", &["air gun", "氣動扳手", "風動扳手"]),
    ("扭力值", &["torque", "扭矩", "鎖緊力矩"]),
];

#[derive(Debug, Clone)]
struct Entry {
    canonical: String,
    synonyms: Vec<String>,
    canonical_lower: String,
    synonyms_lower: Vec<String>,
}

/// Query expander over an ordered synonym table.
#[derive(Debug, Clone)]
pub struct TerminologyExpander {
    entries: Vec<Entry>,
    // lowercased canonical term or synonym -> entry index
    reverse: HashMap<String, usize>,
}

impl Default for TerminologyExpander {
    fn default() -> Self {
        Self::new(
            RAIL_TERMINOLOGY
                .iter()
                .map(|(term, syns)| (term.to_string(), syns.iter().map(|s| s.to_string()).collect())),
        )
    }
}

impl TerminologyExpander {
    /// Build from `(canonical, synonyms)` pairs; table order is preserved in
    /// expansion output.
    pub fn new<I>(table: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut entries = Vec::new();
        let mut reverse = HashMap::new();
        for (canonical, synonyms) in table {
            let idx = entries.len();
            let canonical_lower = canonical.to_lowercase();
            let synonyms_lower: Vec<String> = synonyms.iter().map(|s| s.to_lowercase()).collect();
            reverse.entry(canonical_lower.clone()).or_insert(idx);
            for s in &synonyms_lower {
                reverse.entry(s.clone()).or_insert(idx);
            }
            entries.push(Entry { canonical, synonyms, canonical_lower, synonyms_lower });
        }
        Self { entries, reverse }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original query followed by the synonyms of every term it mentions,
    /// space separated, each added term emitted once.
    pub fn expand(&self, query: &str) -> String {
        let lower = query.to_lowercase();
        let mut added: Vec<&str> = Vec::new();

        for entry in &self.entries {
            let canonical_hit = lower.contains(&entry.canonical_lower);
            let synonym_hit = entry.synonyms_lower.iter().any(|s| lower.contains(s.as_str()));
            if !canonical_hit && !synonym_hit {
                continue;
            }
            if synonym_hit {
                add_term(&mut added, query, &entry.canonical);
            }
            for syn in &entry.synonyms {
                add_term(&mut added, query, syn);
            }
        }

        if added.is_empty() {
            return query.to_string();
        }
        tracing::debug!(query = %query, added = added.len(), "expanded query");
        let mut out = String::with_capacity(query.len() + added.iter().map(|t| t.len() + 1).sum::<usize>());
        out.push_str(query);
        for term in added {
            out.push(' ');
            out.push_str(term);
        }
        out
    }

    /// Canonical form of `term`; unknown terms pass through unchanged.
    pub fn normalize_term(&self, term: &str) -> String {
        match self.reverse.get(&term.to_lowercase()) {
            Some(&idx) => self.entries[idx].canonical.clone(),
            None => term.to_string(),
        }
    }

    /// Canonical term followed by its synonyms, or just `term` when unknown.
    pub fn synonyms_of(&self, term: &str) -> Vec<String> {
        match self.reverse.get(&term.to_lowercase()) {
            Some(&idx) => {
                let entry = &self.entries[idx];
                std::iter::once(entry.canonical.clone()).chain(entry.synonyms.iter().cloned()).collect()
            }
            None => vec![term.to_string()],
        }
    }

    /// Canonical terms mentioned verbatim in `text`, in table order.
    pub fn extract_components(&self, text: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| text.contains(e.canonical.as_str()))
            .map(|e| e.canonical.clone())
            .collect()
    }

    pub fn extract_actions(&self, text: &str) -> Vec<String> {
        ACTION_TERMS.iter().filter(|a| text.contains(*a)).map(|a| a.to_string()).collect()
    }
}

fn add_term<'a>(added: &mut Vec<&'a str>, query: &str, term: &'a str) {
    if term != query && !added.contains(&term) {
        added.push(term);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_query_is_returned_verbatim() {
        let ex = TerminologyExpander::default();
        assert_eq!(ex.expand("hello world"), "hello world");
    }

    #[test]
    fn canonical_term_adds_its_synonyms() {
        let ex = TerminologyExpander::default();
        let out = ex.expand("集電弓");
        assert_eq!(out, "集電弓 pantograph 受電弓");
    }

    #[test]
    fn synonym_adds_canonical_and_siblings() {
        let ex = TerminologyExpander::default();
        let out = ex.expand("Pantograph wear");
        assert_eq!(out, "Pantograph wear 集電弓 pantograph 受電弓");
    }

    #[test]
    fn duplicate_synonym_emitted_once() {
        let ex = TerminologyExpander::new(vec![(
            "量測".to_string(),
            vec!["measure".to_string(), "量測".to_string()],
        )]);
        assert_eq!(ex.expand("量測 步驟"), "量測 步驟 量測 measure");
    }
}
