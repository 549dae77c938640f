use serde::{Deserialize, Serialize};

/// One diagnostic result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaItem {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Informational only; never affects the report's verdict.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub advisory: bool,
}

impl QaItem {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            note: None,
            advisory: false,
        }
    }

    pub fn fail(name: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            note: Some(note.into()),
            advisory: false,
        }
    }

    /// An informational item. Always `ok`.
    pub fn advisory(name: impl Into<String>, note: Option<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            note,
            advisory: true,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Outcome of one smoke run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReport {
    pub pass: bool,
    pub items: Vec<QaItem>,
}

impl QaReport {
    pub fn new(items: Vec<QaItem>) -> Self {
        let pass = items.iter().filter(|i| !i.advisory).all(|i| i.ok);
        Self { pass, items }
    }

    pub fn failures(&self) -> impl Iterator<Item = &QaItem> {
        self.items.iter().filter(|i| !i.ok)
    }

    pub fn item(&self, name: &str) -> Option<&QaItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// One-line verdict, e.g. `FAIL 5/7 (registry.catalog, dom.critical)`.
    pub fn summary(&self) -> String {
        let total = self.items.len();
        let ok = self.items.iter().filter(|i| i.ok).count();
        if self.pass {
            format!("PASS {ok}/{total}")
        } else {
            let names: Vec<&str> = self.failures().map(|i| i.name.as_str()).collect();
            format!("FAIL {ok}/{total} ({})", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_is_and_of_items() {
        let report = QaReport::new(vec![QaItem::pass("a"), QaItem::pass("b")]);
        assert!(report.pass);
        assert_eq!(report.summary(), "PASS 2/2");

        let report = QaReport::new(vec![QaItem::pass("a"), QaItem::fail("b", "broken")]);
        assert!(!report.pass);
        assert_eq!(report.summary(), "FAIL 1/2 (b)");
    }

    #[test]
    fn test_advisory_items_do_not_affect_pass() {
        let mut advisory = QaItem::advisory("schemas", Some("Button lacks a schema".into()));
        let report = QaReport::new(vec![QaItem::pass("a"), advisory.clone()]);
        assert!(report.pass);

        // Even a (malformed) failing advisory item is ignored.
        advisory.ok = false;
        let report = QaReport::new(vec![QaItem::pass("a"), advisory]);
        assert!(report.pass);
    }

    #[test]
    fn test_empty_report_passes() {
        assert!(QaReport::new(vec![]).pass);
    }

    #[test]
    fn test_serialization_omits_defaults() {
        let json = serde_json::to_string(&QaItem::pass("dom.critical")).unwrap();
        assert_eq!(json, r#"{"name":"dom.critical","ok":true}"#);

        let item: QaItem = serde_json::from_str(r#"{"name":"x","ok":false,"note":"n"}"#).unwrap();
        assert_eq!(item, QaItem::fail("x", "n"));
    }
}
