//! Category - タスク分類コードと表示ラベル
//!
//! Source page は各行の `data-category` 属性に `1`..`7` のコードを持ちます。
//! 範囲外のコードは黙って通さず `UnknownCategory` として扱います。

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven task categories published by the organizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Artisticas,
    Charadas,
    Diversas,
    Esportivas,
    Objetos,
    Rua,
    Alternativas,
}

/// A category code outside `1..=7`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category code {0:?}")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Artisticas,
        Category::Charadas,
        Category::Diversas,
        Category::Esportivas,
        Category::Objetos,
        Category::Rua,
        Category::Alternativas,
    ];

    /// Parse the source page code (surrounding whitespace is ignored).
    pub fn from_code(code: &str) -> Result<Self, UnknownCategory> {
        match code.trim() {
            "1" => Ok(Category::Artisticas),
            "2" => Ok(Category::Charadas),
            "3" => Ok(Category::Diversas),
            "4" => Ok(Category::Esportivas),
            "5" => Ok(Category::Objetos),
            "6" => Ok(Category::Rua),
            "7" => Ok(Category::Alternativas),
            _ => Err(UnknownCategory(code.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::Artisticas => "1",
            Category::Charadas => "2",
            Category::Diversas => "3",
            Category::Esportivas => "4",
            Category::Objetos => "5",
            Category::Rua => "6",
            Category::Alternativas => "7",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Artisticas => "🎭 Artísticas",
            Category::Charadas => "💡 Charadas",
            Category::Diversas => "🔍 Diversas",
            Category::Esportivas => "🎾 Esportivas",
            Category::Objetos => "🏺 Objetos",
            Category::Rua => "🔦 Rua",
            Category::Alternativas => "🎯 Alternativas",
        }
    }
}

/// Map a raw code straight to its display label.
pub fn label(code: &str) -> Result<&'static str, UnknownCategory> {
    Category::from_code(code).map(Category::label)
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// 永続化・JSON ではコード文字列として扱う
impl TryFrom<String> for Category {
    type Error = UnknownCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Category::from_code(&value)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.code().to_string()
    }
}
