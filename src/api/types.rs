use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::book::{Book, NewBook};
use crate::domain::errors::ValidationError;
use crate::domain::loan::Loan;
use crate::domain::patron::{NewPatron, Patron};
use crate::ports::repository::{Page, PageRequest};

/// ページングのクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// trueなら全件をページングなしで返す
    #[serde(default)]
    pub unpaged: bool,
}

impl PageQuery {
    pub fn to_page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(PageRequest::DEFAULT_SIZE),
        )
    }
}

/// 書籍の登録・更新リクエスト
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    pub publication_year: i32,
}

impl BookRequest {
    pub fn to_draft(&self) -> Result<NewBook, ValidationError> {
        NewBook::new(
            &self.isbn,
            &self.title,
            &self.author,
            self.description.clone(),
            self.publication_year,
        )
    }
}

/// 書籍レスポンス
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub publication_year: i32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.value(),
            isbn: book.isbn.as_str().to_string(),
            title: book.title,
            author: book.author,
            description: book.description,
            publication_year: book.publication_year.value(),
        }
    }
}

/// 利用者の登録・更新リクエスト
#[derive(Debug, Deserialize)]
pub struct PatronRequest {
    pub name: String,
    pub address: String,
    pub post_no: String,
    pub city: String,
    pub email: String,
    pub phone_no: String,
}

impl PatronRequest {
    pub fn to_draft(&self) -> Result<NewPatron, ValidationError> {
        NewPatron::new(
            &self.name,
            &self.address,
            &self.post_no,
            &self.city,
            &self.email,
            &self.phone_no,
        )
    }
}

/// 利用者レスポンス
#[derive(Debug, Serialize)]
pub struct PatronResponse {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub post_no: String,
    pub city: String,
    pub email: String,
    pub phone_no: String,
}

impl From<Patron> for PatronResponse {
    fn from(patron: Patron) -> Self {
        Self {
            id: patron.id.value(),
            name: patron.name,
            address: patron.address,
            post_no: patron.post_no,
            city: patron.city,
            email: patron.email.as_str().to_string(),
            phone_no: patron.phone_no.as_str().to_string(),
        }
    }
}

/// 貸出レスポンス
///
/// 書籍・利用者はIDのみで参照する。貸出履歴を再帰的に埋め込むことはない。
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub id: i32,
    pub book_id: i32,
    pub patron_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            id: loan.id.value(),
            book_id: loan.book_id.value(),
            patron_id: loan.patron_id.value(),
            borrowed_at: loan.borrowed_at,
            returned_at: loan.returned_at,
        }
    }
}

/// ページングされたレスポンス
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> PageResponse<T> {
    pub fn from_page<E>(page: Page<E>, convert: impl Fn(E) -> T) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items.into_iter().map(convert).collect(),
            page: page.page,
            size: page.size,
            total_elements: page.total_elements,
            total_pages,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}
