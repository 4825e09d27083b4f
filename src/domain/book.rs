use serde::Serialize;

use super::errors::ValidationError;
use super::value_objects::{non_blank, BookId, Isbn, PublicationYear};

/// 書籍 - 貸出対象の蔵書レコード
///
/// ISBNは自然キーであり、一意かつ登録後は不変。カタログ管理が作成・更新・
/// 削除し、貸出エンジンからは読み取り専用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub publication_year: PublicationYear,
}

/// 書籍の登録内容（ID採番前）
///
/// コンストラクタを通過した時点でバリデーション済みであることを型で保証する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub publication_year: PublicationYear,
}

impl NewBook {
    pub fn new(
        isbn: &str,
        title: &str,
        author: &str,
        description: Option<String>,
        publication_year: i32,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            isbn: Isbn::new(isbn)?,
            title: non_blank(title, "title")?,
            author: non_blank(author, "author")?,
            description,
            publication_year: PublicationYear::new(publication_year)?,
        })
    }
}
