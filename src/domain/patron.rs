use serde::Serialize;

use super::errors::ValidationError;
use super::value_objects::{non_blank, Email, PatronId, PhoneNumber};

/// 利用者 - 書籍を借り受けられる主体
///
/// メールアドレスは自然キーであり一意。利用者管理が作成・更新・削除し、
/// 貸出エンジンからは読み取り専用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patron {
    pub id: PatronId,
    pub name: String,
    pub address: String,
    pub post_no: String,
    pub city: String,
    pub email: Email,
    pub phone_no: PhoneNumber,
}

/// 利用者の登録内容（ID採番前）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatron {
    pub name: String,
    pub address: String,
    pub post_no: String,
    pub city: String,
    pub email: Email,
    pub phone_no: PhoneNumber,
}

impl NewPatron {
    pub fn new(
        name: &str,
        address: &str,
        post_no: &str,
        city: &str,
        email: &str,
        phone_no: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: non_blank(name, "name")?,
            address: non_blank(address, "address")?,
            post_no: non_blank(post_no, "post_no")?,
            city: non_blank(city, "city")?,
            email: Email::new(email)?,
            phone_no: PhoneNumber::new(phone_no)?,
        })
    }
}
