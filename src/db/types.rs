use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "essaystatus", rename_all = "lowercase")]
pub(crate) enum EssayStatus {
    Graded,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "mockexamstatus", rename_all = "lowercase")]
pub(crate) enum MockExamStatus {
    Generated,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficultylevel", rename_all = "lowercase")]
pub(crate) enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DifficultyLevel::Easy => "easy",
            DifficultyLevel::Medium => "medium",
            DifficultyLevel::Hard => "hard",
        }
    }

    /// Lenient parse for model output ("fácil", "Medium", "dificil", ...).
    pub(crate) fn parse_loose(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "easy" | "facil" | "fácil" | "basico" | "básico" => Some(DifficultyLevel::Easy),
            "medium" | "medio" | "médio" | "media" | "média" | "intermediario"
            | "intermediário" => Some(DifficultyLevel::Medium),
            "hard" | "dificil" | "difícil" | "avancado" | "avançado" => Some(DifficultyLevel::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "mentorrole", rename_all = "lowercase")]
pub(crate) enum MentorRole {
    User,
    Assistant,
}

impl MentorRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            MentorRole::User => "user",
            MentorRole::Assistant => "assistant",
        }
    }
}

/// The four ENEM knowledge areas. Stored inside JSON documents, not as a
/// database enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum KnowledgeArea {
    Linguagens,
    CienciasHumanas,
    CienciasNatureza,
    Matematica,
}

impl KnowledgeArea {
    pub(crate) const ALL: [KnowledgeArea; 4] = [
        KnowledgeArea::Linguagens,
        KnowledgeArea::CienciasHumanas,
        KnowledgeArea::CienciasNatureza,
        KnowledgeArea::Matematica,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            KnowledgeArea::Linguagens => "linguagens",
            KnowledgeArea::CienciasHumanas => "ciencias_humanas",
            KnowledgeArea::CienciasNatureza => "ciencias_natureza",
            KnowledgeArea::Matematica => "matematica",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            KnowledgeArea::Linguagens => "Linguagens, Códigos e suas Tecnologias",
            KnowledgeArea::CienciasHumanas => "Ciências Humanas e suas Tecnologias",
            KnowledgeArea::CienciasNatureza => "Ciências da Natureza e suas Tecnologias",
            KnowledgeArea::Matematica => "Matemática e suas Tecnologias",
        }
    }

    /// Accepts the canonical code, the Portuguese label or a common short name.
    pub(crate) fn parse_loose(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .map(|ch| match ch {
                'á' | 'à' | 'â' | 'ã' => 'a',
                'é' | 'ê' => 'e',
                'í' => 'i',
                'ó' | 'ô' | 'õ' => 'o',
                'ú' => 'u',
                'ç' => 'c',
                ' ' | '-' => '_',
                other => other,
            })
            .collect();

        if normalized.starts_with("linguagens") || normalized == "portugues" {
            Some(KnowledgeArea::Linguagens)
        } else if normalized.starts_with("ciencias_humanas") || normalized == "humanas" {
            Some(KnowledgeArea::CienciasHumanas)
        } else if normalized.starts_with("ciencias_da_natureza")
            || normalized.starts_with("ciencias_natureza")
            || normalized == "natureza"
        {
            Some(KnowledgeArea::CienciasNatureza)
        } else if normalized.starts_with("matematica") {
            Some(KnowledgeArea::Matematica)
        } else {
            None
        }
    }
}

impl fmt::Display for KnowledgeArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knowledge_area_parses_labels_and_codes() {
        for area in KnowledgeArea::ALL {
            assert_eq!(KnowledgeArea::parse_loose(area.as_str()), Some(area));
            assert_eq!(KnowledgeArea::parse_loose(area.label()), Some(area));
        }
        assert_eq!(KnowledgeArea::parse_loose("Matemática"), Some(KnowledgeArea::Matematica));
        assert_eq!(KnowledgeArea::parse_loose("humanas"), Some(KnowledgeArea::CienciasHumanas));
        assert_eq!(KnowledgeArea::parse_loose("química"), None);
    }

    #[test]
    fn knowledge_area_serializes_snake_case() {
        let json = serde_json::to_string(&KnowledgeArea::CienciasNatureza).unwrap();
        assert_eq!(json, "\"ciencias_natureza\"");
    }

    #[test]
    fn difficulty_parse_loose_accepts_portuguese() {
        assert_eq!(DifficultyLevel::parse_loose("Difícil"), Some(DifficultyLevel::Hard));
        assert_eq!(DifficultyLevel::parse_loose("facil"), Some(DifficultyLevel::Easy));
        assert_eq!(DifficultyLevel::parse_loose("média"), Some(DifficultyLevel::Medium));
        assert_eq!(DifficultyLevel::parse_loose("???"), None);
    }
}
