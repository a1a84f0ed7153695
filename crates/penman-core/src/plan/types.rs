//! The article outline and the addresses of its bodies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A structured outline, later filled with bodies by the writer.
///
/// Section order is document order. A plan produced by the planner always
/// has at least one section and no empty headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePlan {
    pub title: String,
    pub topic: String,
    /// Programming language the article is about.
    pub language: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    /// Guidance for the writer. Never rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub heading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Section {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            description: None,
            subsections: Vec::new(),
            body: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_subsection(mut self, subsection: Subsection) -> Self {
        self.subsections.push(subsection);
        self
    }
}

impl Subsection {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            description: None,
            body: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Address of one body: a section, or a subsection within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodySlot {
    pub section: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<usize>,
}

impl BodySlot {
    pub fn section(section: usize) -> Self {
        Self {
            section,
            subsection: None,
        }
    }

    pub fn subsection(section: usize, subsection: usize) -> Self {
        Self {
            section,
            subsection: Some(subsection),
        }
    }
}

/// 1-based, as a reader would count: `§2` or `§2.1`.
impl fmt::Display for BodySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subsection {
            Some(sub) => write!(f, "§{}.{}", self.section + 1, sub + 1),
            None => write!(f, "§{}", self.section + 1),
        }
    }
}

impl ArticlePlan {
    pub fn new(
        title: impl Into<String>,
        topic: impl Into<String>,
        language: impl Into<String>,
        sections: Vec<Section>,
    ) -> Self {
        Self {
            title: title.into(),
            topic: topic.into(),
            language: language.into(),
            sections,
        }
    }

    /// Every body slot in document order: a section, then its subsections.
    pub fn slots(&self) -> Vec<BodySlot> {
        let mut slots = Vec::new();
        for (i, section) in self.sections.iter().enumerate() {
            slots.push(BodySlot::section(i));
            for j in 0..section.subsections.len() {
                slots.push(BodySlot::subsection(i, j));
            }
        }
        slots
    }

    fn subsection(&self, slot: BodySlot) -> Option<(&Section, Option<&Subsection>)> {
        let section = self.sections.get(slot.section)?;
        match slot.subsection {
            Some(j) => section.subsections.get(j).map(|sub| (section, Some(sub))),
            None => Some((section, None)),
        }
    }

    /// Heading of the slot itself.
    pub fn heading(&self, slot: BodySlot) -> Option<&str> {
        self.subsection(slot).map(|(section, sub)| match sub {
            Some(sub) => sub.heading.as_str(),
            None => section.heading.as_str(),
        })
    }

    /// `"Section"` or `"Section - Subsection"`.
    pub fn heading_path(&self, slot: BodySlot) -> Option<String> {
        self.subsection(slot).map(|(section, sub)| match sub {
            Some(sub) => format!("{} - {}", section.heading, sub.heading),
            None => section.heading.clone(),
        })
    }

    pub fn description(&self, slot: BodySlot) -> Option<&str> {
        self.subsection(slot).and_then(|(section, sub)| match sub {
            Some(sub) => sub.description.as_deref(),
            None => section.description.as_deref(),
        })
    }

    pub fn body(&self, slot: BodySlot) -> Option<&str> {
        self.subsection(slot).and_then(|(section, sub)| match sub {
            Some(sub) => sub.body.as_deref(),
            None => section.body.as_deref(),
        })
    }

    /// Store a body. Returns `false` if the slot does not exist.
    pub fn set_body(&mut self, slot: BodySlot, body: String) -> bool {
        let Some(section) = self.sections.get_mut(slot.section) else {
            return false;
        };
        match slot.subsection {
            Some(j) => match section.subsections.get_mut(j) {
                Some(sub) => {
                    sub.body = Some(body);
                    true
                }
                None => false,
            },
            None => {
                section.body = Some(body);
                true
            }
        }
    }

    /// Heading paths of every slot before `slot`, in document order.
    pub fn preceding_headings(&self, slot: BodySlot) -> Vec<String> {
        self.slots()
            .into_iter()
            .take_while(|s| *s != slot)
            .filter_map(|s| self.heading_path(s))
            .collect()
    }

    /// Indented outline of all headings, used in prompts.
    pub fn heading_outline(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, section.heading));
            for (j, sub) in section.subsections.iter().enumerate() {
                out.push_str(&format!("   {}.{}. {}\n", i + 1, j + 1, sub.heading));
            }
        }
        out
    }

    /// Section and subsection headings only, bodies dropped.
    pub fn heading_structure(&self) -> Vec<(String, Vec<String>)> {
        self.sections
            .iter()
            .map(|s| {
                (
                    s.heading.clone(),
                    s.subsections.iter().map(|sub| sub.heading.clone()).collect(),
                )
            })
            .collect()
    }
}
