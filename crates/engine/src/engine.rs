//! 분해 엔진 -- 로드된 규칙 테이블별 파이프라인 레지스트리

use std::collections::BTreeMap;
use std::sync::Arc;

use logsift_core::error::DissectError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::DissectPipeline;
use crate::rule::{RuleLoader, RuleTable};

/// 테이블 이름 -> 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let engine = DissectEngine::load(config).await?;
/// let pipeline = engine.pipeline("cyberark")?;
/// let outcome = pipeline.dissect(line, &Metadata::new())?;
/// ```
#[derive(Debug)]
pub struct DissectEngine {
    config: EngineConfig,
    pipelines: BTreeMap<String, Arc<DissectPipeline>>,
}

impl DissectEngine {
    /// 설정의 `rule_paths`에서 규칙 테이블을 로드하여 엔진을 생성합니다.
    pub async fn load(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let tables = RuleLoader::load_paths(&config.rule_paths).await?;
        Self::from_tables(config, tables)
    }

    /// 이미 컴파일된 테이블로 엔진을 생성합니다.
    pub fn from_tables(config: EngineConfig, tables: Vec<RuleTable>) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = build_pool(config.workers)?;

        let mut pipelines = BTreeMap::new();
        for table in tables {
            let name = table.name.clone();
            let mut pipeline = DissectPipeline::new(Arc::new(table), &config);
            if let Some(pool) = &pool {
                pipeline = pipeline.with_pool(Arc::clone(pool));
            }
            if pipelines.insert(name.clone(), Arc::new(pipeline)).is_some() {
                return Err(EngineError::RuleValidation {
                    rule_id: name,
                    reason: "duplicate table name".to_owned(),
                });
            }
        }

        info!(
            tables = pipelines.len(),
            workers = config.workers,
            tz = %config.tz,
            "dissect engine ready"
        );
        Ok(Self { config, pipelines })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 이름으로 파이프라인을 찾습니다.
    pub fn pipeline(&self, name: &str) -> Result<Arc<DissectPipeline>, DissectError> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| DissectError::UnknownTable(name.to_owned()))
    }

    /// 테이블이 하나뿐이면 그 파이프라인을 반환합니다.
    pub fn sole_pipeline(&self) -> Option<Arc<DissectPipeline>> {
        match self.pipelines.len() {
            1 => self.pipelines.values().next().cloned(),
            _ => None,
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// `workers`가 0이면 rayon 전역 풀을 사용합니다.
fn build_pool(workers: usize) -> Result<Option<Arc<ThreadPool>>, EngineError> {
    if workers == 0 {
        return Ok(None);
    }
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("logsift-worker-{i}"))
        .build()
        .map(|pool| Some(Arc::new(pool)))
        .map_err(|e| EngineError::Config {
            field: "workers".to_owned(),
            reason: format!("failed to build worker pool: {e}"),
        })
}
