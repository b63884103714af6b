//! 患者登记: 表单校验与 JSON 文件存储.
//!
//! 每次提交写一个 `patient_{nom}_{prenom}.json` 文件, 同名文件直接覆盖.
//! 没有修改与删除接口.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// 年龄上限.
pub const MAX_AGE: u32 = 120;

/// 表单校验错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 缺少必填字段. 参数为字段显示名.
    Missing(Vec<&'static str>),

    /// 年龄超出 `1..=120`.
    AgeOutOfRange(u32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(fields) => write!(
                f,
                "Veuillez remplir tous les champs obligatoires (*): {}",
                fields.join(", ")
            ),
            Self::AgeOutOfRange(age) => {
                write!(f, "Âge invalide: {age} (maximum {MAX_AGE})")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// 存储错误.
#[derive(Debug)]
pub enum StoreError {
    /// 文件读写失败.
    Io(std::io::Error),

    /// JSON 编解码失败.
    Json(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "patient file I/O error: {e}"),
            Self::Json(e) => write!(f, "patient file JSON error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// 用户填写的表单. 除 `notes` 外全部必填.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientForm {
    /// 姓.
    pub name: String,

    /// 名.
    pub surname: String,

    /// 邮箱.
    pub email: String,

    /// 年龄. 0 视为未填写.
    pub age: u32,

    /// 电话.
    pub phone: String,

    /// 地址.
    pub address: String,

    /// 补充信息 (症状, 病史等), 可为空.
    pub notes: String,
}

impl PatientForm {
    /// 校验表单. 空白字符串和年龄 0 都视为未填写.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let blank = |s: &str| s.trim().is_empty();
        let missing: Vec<&'static str> = [
            ("Nom", blank(&self.name)),
            ("Prénom", blank(&self.surname)),
            ("Email", blank(&self.email)),
            ("Âge", self.age == 0),
            ("Téléphone", blank(&self.phone)),
            ("Adresse", blank(&self.address)),
        ]
        .into_iter()
        .filter_map(|(field, missing)| missing.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(ValidationError::Missing(missing));
        }
        if self.age > MAX_AGE {
            return Err(ValidationError::AgeOutOfRange(self.age));
        }
        Ok(())
    }

    /// 校验并生成记录, 提交日期为 `date`.
    pub fn into_record(self, date: Date) -> Result<PatientRecord, ValidationError> {
        self.validate()?;
        Ok(PatientRecord {
            name: self.name.trim().to_string(),
            surname: self.surname.trim().to_string(),
            email: self.email.trim().to_string(),
            age: self.age,
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            notes: self.notes,
            date: format_date(date),
        })
    }
}

/// 以 `YYYY-MM-DD` 格式化日期.
pub fn format_date(date: Date) -> String {
    let fd = format_description!("[year]-[month]-[day]");
    // 四位年份的日期总能格式化成功.
    date.format(&fd).unwrap_or_else(|_| date.to_string())
}

/// 本地时区的今天. 无法获取本地时区时使用 UTC.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// 已登记的患者记录. JSON 字段名沿用既有文件格式.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// 姓.
    #[serde(rename = "nom")]
    pub name: String,

    /// 名.
    #[serde(rename = "prenom")]
    pub surname: String,

    /// 邮箱.
    pub email: String,

    /// 年龄.
    pub age: u32,

    /// 电话.
    #[serde(rename = "telephone")]
    pub phone: String,

    /// 地址.
    #[serde(rename = "adresse")]
    pub address: String,

    /// 补充信息.
    #[serde(rename = "commentaires", default)]
    pub notes: String,

    /// 提交日期, `YYYY-MM-DD`.
    pub date: String,
}

/// 文件名中的路径分隔符等字符替换为 `_`.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if std::path::is_separator(c) || matches!(c, '\\' | '\0' | ':') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

impl PatientRecord {
    /// 记录对应的文件名.
    pub fn file_name(&self) -> String {
        format!(
            "patient_{}_{}.json",
            sanitize(&self.name),
            sanitize(&self.surname)
        )
    }
}

/// 患者记录目录.
#[derive(Clone, Debug)]
pub struct PatientStore {
    dir: PathBuf,
}

impl PatientStore {
    /// 以 `dir` 为存储目录. 此时不创建目录.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
        }
    }

    /// 存储目录.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 写入记录 (4 空格缩进), 返回文件路径. 目录不存在时自动创建.
    pub fn save(&self, record: &PatientRecord) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(record.file_name());
        if path.exists() {
            log::warn!("overwriting {}", path.display());
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        record.serialize(&mut ser)?;
        fs::write(&path, buf)?;

        log::info!("saved patient record {}", path.display());
        Ok(path)
    }

    /// 读取全部记录, 按文件名排序. 目录不存在时返回空列表, 无法解析的文件跳过.
    pub fn list(&self) -> Result<Vec<PatientRecord>, StoreError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("patient_") && n.ends_with(".json"))
            })
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for p in paths {
            let text = fs::read_to_string(&p)?;
            match serde_json::from_str(&text) {
                Ok(r) => records.push(r),
                Err(e) => log::warn!("skipping {}: {e}", p.display()),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn form() -> PatientForm {
        PatientForm {
            name: "Alaoui".to_string(),
            surname: "Sara".to_string(),
            email: "sara@example.com".to_string(),
            age: 34,
            phone: "+212 600000000".to_string(),
            address: "12 rue des Lilas, Rabat".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_missing_fields() {
        let f = PatientForm {
            surname: "  ".to_string(),
            age: 0,
            address: String::new(),
            ..form()
        };
        assert_eq!(
            f.validate(),
            Err(ValidationError::Missing(vec!["Prénom", "Âge", "Adresse"]))
        );
    }

    #[test]
    fn test_age_limit() {
        let f = PatientForm { age: 121, ..form() };
        assert_eq!(f.validate(), Err(ValidationError::AgeOutOfRange(121)));
        let f = PatientForm { age: 120, ..form() };
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_record_json_keys() {
        let r = form().into_record(date!(2024 - 03 - 07)).unwrap();
        assert_eq!(r.date, "2024-03-07");
        let v = serde_json::to_value(&r).unwrap();
        for key in [
            "nom",
            "prenom",
            "email",
            "age",
            "telephone",
            "adresse",
            "commentaires",
            "date",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["age"], 34);
    }

    #[test]
    fn test_store_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatientStore::new(dir.path().join("data"));
        assert!(store.list().unwrap().is_empty());

        let r = form().into_record(date!(2024 - 01 - 02)).unwrap();
        let path = store.save(&r).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "patient_Alaoui_Sara.json"
        );
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"nom\": \"Alaoui\""));

        // 同名覆盖.
        let r2 = PatientRecord {
            age: 35,
            ..r.clone()
        };
        store.save(&r2).unwrap();
        fs::write(dir.path().join("data/patient_bad.json"), "{").unwrap();
        let all = store.list().unwrap();
        assert_eq!(all, vec![r2]);
    }

    #[test]
    fn test_file_name_sanitized() {
        let mut r = form().into_record(date!(2024 - 01 - 02)).unwrap();
        r.name = "../etc".to_string();
        assert_eq!(r.file_name(), "patient_.._etc_Sara.json");
    }
}
