use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// 書籍ID - カタログ管理コンテキストが採番する不透明な整数ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(i32);

impl BookId {
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl From<i32> for BookId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 利用者ID - 利用者管理コンテキストが採番する不透明な整数ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatronId(i32);

impl PatronId {
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl From<i32> for PatronId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for PatronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 貸出ID - 貸出ストアが採番する不透明な整数ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(i32);

impl LoanId {
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl From<i32> for LoanId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// 検証済み文字列の値オブジェクト
// ============================================================================

/// ISBNの字面として許される文字列（任意の`ISBN:`系プレフィックスを含む）
static ISBN_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:ISBN(?:-1[03])?:? )?[0-9][0-9X -]{8,15}[0-9X]$").unwrap());

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+?\d{1,3}[-.\s]?)?\(?\d{1,4}\)?[-.\s]?\d{1,4}[-.\s]?\d{1,9}$").unwrap()
});

/// ISBN - 書籍の自然キー
///
/// 不変条件：ハイフン・空白を除いた本体が10桁（末尾のみX可）、または
/// 978/979で始まる13桁であること。登録後は変更不可。
/// チェックディジットの検算までは行わない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if !ISBN_SHAPE.is_match(value) {
            return Err(ValidationError::InvalidIsbn(value.to_string()));
        }

        let body = strip_isbn_prefix(value);
        let compact: Vec<char> = body.chars().filter(|c| *c != '-' && *c != ' ').collect();
        let valid = match compact.len() {
            10 => {
                compact[..9].iter().all(char::is_ascii_digit)
                    && (compact[9].is_ascii_digit() || compact[9] == 'X')
            }
            13 => {
                compact.iter().all(char::is_ascii_digit)
                    && (compact.starts_with(&['9', '7', '8']) || compact.starts_with(&['9', '7', '9']))
            }
            _ => false,
        };

        if !valid {
            return Err(ValidationError::InvalidIsbn(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_isbn_prefix(value: &str) -> &str {
    let Some(rest) = value.strip_prefix("ISBN") else {
        return value;
    };
    let rest = rest
        .strip_prefix("-10")
        .or_else(|| rest.strip_prefix("-13"))
        .unwrap_or(rest);
    rest.strip_prefix(':').unwrap_or(rest).trim_start()
}

/// メールアドレス - 利用者の自然キー
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if !EMAIL_PATTERN.is_match(value) {
            return Err(ValidationError::InvalidEmail(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 電話番号
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if !PHONE_PATTERN.is_match(value) {
            return Err(ValidationError::InvalidPhoneNumber(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 出版年
///
/// 不変条件：1000年から2025年までの範囲内であること。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PublicationYear(i32);

impl PublicationYear {
    pub const MIN: i32 = 1000;
    pub const MAX: i32 = 2025;

    pub fn new(value: i32) -> Result<Self, ValidationError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValidationError::PublicationYearOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

/// 空白のみの文字列を拒否する共通バリデーション
pub(crate) fn non_blank(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank { field });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // TDD: Isbn のテスト
    #[test]
    fn test_isbn_accepts_plain_ten_digits() {
        assert!(Isbn::new("0306406152").is_ok());
    }

    #[test]
    fn test_isbn_accepts_ten_digits_with_check_x() {
        assert!(Isbn::new("097522980X").is_ok());
    }

    #[test]
    fn test_isbn_accepts_hyphenated_ten_digits() {
        assert!(Isbn::new("0-306-40615-2").is_ok());
    }

    #[test]
    fn test_isbn_accepts_thirteen_digits() {
        assert!(Isbn::new("9783161484100").is_ok());
    }

    #[test]
    fn test_isbn_accepts_hyphenated_thirteen_digits() {
        assert!(Isbn::new("978-3-16-148410-0").is_ok());
    }

    #[test]
    fn test_isbn_accepts_prefixed_form() {
        assert!(Isbn::new("ISBN-13: 978-0-306-40615-7").is_ok());
        assert!(Isbn::new("ISBN: 0306406152").is_ok());
    }

    #[test]
    fn test_isbn_rejects_wrong_length() {
        assert!(Isbn::new("12345").is_err());
        assert!(Isbn::new("97831614841001").is_err());
    }

    #[test]
    fn test_isbn_rejects_thirteen_digits_without_bookland_prefix() {
        assert!(Isbn::new("1233161484100").is_err());
    }

    #[test]
    fn test_isbn_rejects_letters() {
        assert!(Isbn::new("03064O6152").is_err());
    }

    #[test]
    fn test_isbn_rejects_x_in_the_middle() {
        assert!(Isbn::new("03X6406152").is_err());
    }

    // TDD: Email のテスト
    #[test]
    fn test_email_accepts_common_form() {
        assert!(Email::new("patron@example.com").is_ok());
        assert!(Email::new("first.last+tag@sub.example.org").is_ok());
    }

    #[test]
    fn test_email_rejects_missing_at_or_domain() {
        assert!(Email::new("patron.example.com").is_err());
        assert!(Email::new("patron@").is_err());
        assert!(Email::new("patron@example").is_err());
    }

    // TDD: PhoneNumber のテスト
    #[test]
    fn test_phone_accepts_international_and_local_forms() {
        assert!(PhoneNumber::new("+1 555-867-5309").is_ok());
        assert!(PhoneNumber::new("0701234567").is_ok());
        assert!(PhoneNumber::new("(070) 123-4567").is_ok());
    }

    #[test]
    fn test_phone_rejects_non_numeric_input() {
        assert!(PhoneNumber::new("call me").is_err());
        assert!(PhoneNumber::new("").is_err());
    }

    // TDD: PublicationYear のテスト
    #[test]
    fn test_publication_year_bounds() {
        assert!(PublicationYear::new(1000).is_ok());
        assert!(PublicationYear::new(2025).is_ok());
        assert!(PublicationYear::new(999).is_err());
        assert!(PublicationYear::new(2026).is_err());
    }

    // ID value objects のテスト
    #[test]
    fn test_ids_preserve_raw_value() {
        assert_eq!(BookId::new(7).value(), 7);
        assert_eq!(PatronId::from(42).value(), 42);
        assert_eq!(LoanId::new(1).to_string(), "1");
    }

    #[test]
    fn test_non_blank_trims_and_rejects_empty() {
        assert_eq!(non_blank("  title  ", "title").unwrap(), "title");
        assert!(non_blank("   ", "title").is_err());
    }
}
