//! 규칙 테이블 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 컴파일합니다.
//! 디렉토리 모드에서 개별 파일 실패는 경고 로그를 남기고 건너뛰며,
//! 단일 파일 경로의 실패와 테이블 이름 중복은 에러입니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use logsift_core::metrics::{ENGINE_RULE_TABLES_LOADED_TOTAL, LABEL_TABLE};
use metrics::counter;
use tracing::{info, warn};

use crate::error::EngineError;

use super::compile::{RuleTable, compile_table};
use super::types::RuleTableDef;

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 로드 가능한 테이블 수 상한
const MAX_TABLES_COUNT: usize = 1_000;

/// 규칙 테이블 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 설정의 `rule_paths`를 순서대로 로드합니다.
    ///
    /// 디렉토리는 [`load_directory`](Self::load_directory), 파일은
    /// [`load_file`](Self::load_file)로 처리합니다.
    pub async fn load_paths(paths: &[String]) -> Result<Vec<RuleTable>, EngineError> {
        let mut tables = Vec::new();
        let mut seen = HashSet::new();

        for raw in paths {
            let path = PathBuf::from(raw);
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|e| EngineError::RuleLoad {
                    path: raw.clone(),
                    reason: format!("failed to read path metadata: {e}"),
                })?;

            let loaded = if metadata.is_dir() {
                Self::load_directory(&path).await?
            } else {
                vec![Self::load_file(&path).await?]
            };

            for table in loaded {
                if !seen.insert(table.name.clone()) {
                    return Err(EngineError::RuleLoad {
                        path: raw.clone(),
                        reason: format!("duplicate table name '{}'", table.name),
                    });
                }
                tables.push(table);
            }
        }

        info!(paths = paths.len(), count = tables.len(), "loaded rule tables");
        Ok(tables)
    }

    /// 디렉토리에서 모든 YAML 규칙 파일을 로드합니다.
    ///
    /// `.yml` 또는 `.yaml` 확장자를 가진 파일만 이름 순으로 처리합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 같은 이름의 테이블이 둘 이상인 경우
    /// - 테이블 수가 `MAX_TABLES_COUNT`를 초과하는 경우
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<RuleTable>, EngineError> {
        let dir = dir.as_ref();

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory entry: {e}"),
            })?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tables: Vec<RuleTable> = Vec::new();
        for path in paths {
            match Self::load_file(&path).await {
                Ok(table) => {
                    if tables.iter().any(|t| t.name == table.name) {
                        return Err(EngineError::RuleLoad {
                            path: path.display().to_string(),
                            reason: format!("duplicate table name '{}'", table.name),
                        });
                    }
                    tables.push(table);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }

            if tables.len() > MAX_TABLES_COUNT {
                return Err(EngineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rule tables: max {MAX_TABLES_COUNT}"),
                });
            }
        }

        info!(
            dir = %dir.display(),
            count = tables.len(),
            "loaded rule directory"
        );

        Ok(tables)
    }

    /// 단일 YAML 파일에서 규칙 테이블을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<RuleTable, EngineError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하고 컴파일합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<RuleTable, EngineError> {
        let def: RuleTableDef =
            serde_yaml::from_str(yaml_str).map_err(|e| EngineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        let table = compile_table(def)?;
        counter!(ENGINE_RULE_TABLES_LOADED_TOTAL, LABEL_TABLE => table.name.clone()).increment(1);
        Ok(table)
    }
}
