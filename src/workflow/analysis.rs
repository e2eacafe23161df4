//! 学习分析流程
//!
//! Classify 把问题归入五类之一，Answer 按类别调用分析工具收集数据后再请模型作答。

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value as JsonValue};
use tracing::info;

use crate::clients::ChatMessage;
use crate::error::{AppError, AppResult};
use crate::services::analysis_tools::{
    self, AnalysisTools, CREATE_WRITING_PROMPT, GET_AVG_SCORE_BY_TYPE, GET_COMMON_MATH_MISTAKES,
    GET_COMMON_WEAKNESSES, GET_MATH_ACCURACY, GET_RECENT_WRITINGS, GET_SINGLE_WRITING_DETAILS,
    GET_TOP_WEAKNESS, SEARCH_WRITINGS_BY_DATE, SEARCH_WRITINGS_BY_TYPE, SUGGEST_PRACTICE_TOPICS,
};
use crate::services::ModelGateway;
use crate::workflow::pipeline::{run_pipeline, Pipeline};
use crate::workflow::state::WorkflowOutcome;

/// 没有作文可分析时的回复
pub const NOTHING_TO_ANALYZE: &str = "I don't see any writings to analyze yet. \
     Please submit a writing first, and then I can help analyze it!";

/// 按日期查询时的默认回溯天数
const DEFAULT_DATE_RANGE_DAYS: i64 = 7;

/// 宏观分析中列出的数学错题模式数量
const MATH_MISTAKE_LIMIT: usize = 3;

/// 问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisType {
    MacroAnalysis,
    SingleAnalysis,
    LearningAdvice,
    DataQuery,
    #[default]
    General,
}

impl AnalysisType {
    /// 按顺序匹配的具体类别
    const ORDERED: [AnalysisType; 4] = [
        AnalysisType::MacroAnalysis,
        AnalysisType::SingleAnalysis,
        AnalysisType::LearningAdvice,
        AnalysisType::DataQuery,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AnalysisType::MacroAnalysis => "Macro Analysis",
            AnalysisType::SingleAnalysis => "Single Analysis",
            AnalysisType::LearningAdvice => "Learning Advice",
            AnalysisType::DataQuery => "Data Query",
            AnalysisType::General => "General",
        }
    }

    /// 回复中包含类别名（区分大小写）即归入该类；都不包含则为 General
    pub fn from_reply(reply: &str) -> Self {
        Self::ORDERED
            .into_iter()
            .find(|t| reply.contains(t.label()))
            .unwrap_or(AnalysisType::General)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Classify,
    Answer,
}

const STAGES: &[AnalysisStage] = &[AnalysisStage::Classify, AnalysisStage::Answer];

/// 分支处理的结果
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisAnswer {
    pub tools_used: Vec<&'static str>,
    pub analysis_result: JsonValue,
    pub ai_content: String,
}

#[derive(Debug)]
pub enum AnalysisUpdate {
    Classified(AnalysisType),
    Answered(AnalysisAnswer),
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisWorkflowState {
    pub question: String,
    pub analysis_type: AnalysisType,
    pub answer: Option<AnalysisAnswer>,
}

/// 学习分析流程
pub struct AnalysisWorkflow {
    gateway: ModelGateway,
    tools: AnalysisTools,
}

impl AnalysisWorkflow {
    pub fn new(gateway: ModelGateway, tools: AnalysisTools) -> Self {
        Self { gateway, tools }
    }

    pub async fn run(&self, question: &str) -> AppResult<WorkflowOutcome> {
        let state = AnalysisWorkflowState {
            question: question.to_string(),
            ..Default::default()
        };
        let state = run_pipeline(self, state).await?;
        let answer = state.answer.ok_or(AppError::StageInput("answer"))?;

        Ok(WorkflowOutcome {
            ai_content: answer.ai_content,
            workflow_result: Some(json!({
                "analysis_type": state.analysis_type.label(),
                "tools_used": answer.tools_used,
                "analysis_result": answer.analysis_result,
            })),
        })
    }

    async fn classify(&self, question: &str) -> AppResult<AnalysisType> {
        let prompt = format!(
            "Classify this question about writing skills into one of these categories:\n\
             1. Macro Analysis - questions about overall writing performance, trends, general skills\n\
             2. Single Analysis - questions about a specific writing piece or recent work\n\
             3. Learning Advice - questions about how to improve or what to practice\n\
             4. Data Query - questions about searching or finding specific writings\n\n\
             Question: {}\n\n\
             Return only the category name (e.g., \"Macro Analysis\").\n\
             If the question doesn't fit any category, return \"General\".",
            question
        );
        let reply = self.gateway.invoke_prompt(&prompt).await?;
        let analysis_type = AnalysisType::from_reply(reply.trim());

        info!("🔎 分析问题类别: {}", analysis_type.label());
        Ok(analysis_type)
    }

    async fn answer(&self, state: &AnalysisWorkflowState) -> AppResult<AnalysisAnswer> {
        let question = state.question.as_str();
        match state.analysis_type {
            AnalysisType::MacroAnalysis => self.macro_analysis(question).await,
            AnalysisType::SingleAnalysis => self.single_analysis(question).await,
            AnalysisType::LearningAdvice => self.learning_advice(question).await,
            AnalysisType::DataQuery => self.data_query(question).await,
            AnalysisType::General => self.general_response(question).await,
        }
    }

    async fn macro_analysis(&self, question: &str) -> AppResult<AnalysisAnswer> {
        let lowered = question.to_lowercase();
        let mut tools_used = Vec::new();
        let mut results = Map::new();
        let mut recent_count = 0;
        let mut avg_score = None;
        let mut weaknesses = Vec::new();
        let mut math_summary = String::new();

        if lowered.contains("overall") || lowered.contains("general") {
            let recent = self.tools.get_recent_writings(10).await?;
            let avg = self.tools.get_avg_score_by_type(None).await?;
            tools_used.extend([GET_RECENT_WRITINGS, GET_AVG_SCORE_BY_TYPE]);
            recent_count = recent.len();
            avg_score = Some(avg);
            results.insert("recent_writings".to_string(), encode(&recent)?);
            results.insert("avg_score".to_string(), json!(avg));
        }

        if lowered.contains("weakness") || lowered.contains("improve") {
            weaknesses = self.tools.get_common_weaknesses(5).await?;
            tools_used.push(GET_COMMON_WEAKNESSES);
            results.insert("common_weaknesses".to_string(), encode(&weaknesses)?);
        }

        if lowered.contains("math") {
            let accuracy = self.tools.get_math_accuracy(None).await?;
            let mistakes = self.tools.get_common_math_mistakes(MATH_MISTAKE_LIMIT).await?;
            tools_used.extend([GET_MATH_ACCURACY, GET_COMMON_MATH_MISTAKES]);
            math_summary = format!(
                "\n- Math Accuracy: {:.0}%\n- Common Math Mistakes: {}",
                accuracy * 100.0,
                serde_json::to_string(&mistakes).map_err(AppError::Encoding)?
            );
            results.insert("math_accuracy".to_string(), json!(accuracy));
            results.insert("common_math_mistakes".to_string(), encode(&mistakes)?);
        }

        let prompt = format!(
            "Based on the following data about the student's writing, answer this question: {}\n\n\
             Data:\n\
             - Average Score: {}\n\
             - Recent Writings Count: {}\n\
             - Common Weaknesses: {}{}\n\n\
             Provide a helpful, encouraging response suitable for a child and their parents.",
            question,
            avg_score.map_or_else(|| "N/A".to_string(), |s| format!("{:.1}", s)),
            recent_count,
            serde_json::to_string(&weaknesses).map_err(AppError::Encoding)?,
            math_summary
        );
        let ai_content = self.gateway.invoke_prompt(&prompt).await?;

        Ok(AnalysisAnswer {
            tools_used,
            analysis_result: JsonValue::Object(results),
            ai_content,
        })
    }

    async fn single_analysis(&self, question: &str) -> AppResult<AnalysisAnswer> {
        let mut tools_used = vec![GET_RECENT_WRITINGS];
        let Some(recent) = self.tools.get_recent_writings(1).await?.into_iter().next() else {
            return Ok(AnalysisAnswer {
                tools_used,
                analysis_result: json!({"recent_writing": null}),
                ai_content: NOTHING_TO_ANALYZE.to_string(),
            });
        };

        let details = match recent.id.as_deref() {
            Some(id) => {
                tools_used.push(GET_SINGLE_WRITING_DETAILS);
                self.tools.get_single_writing_details(id).await?
            }
            None => None,
        };
        let (strengths, weaknesses) = details
            .as_ref()
            .map(|d| (d.strengths.clone(), d.weaknesses.clone()))
            .unwrap_or_default();

        let prompt = format!(
            "Answer this question about the student's recent writing: {}\n\n\
             Writing Details:\n\
             - Title: {}\n\
             - Overall Score: {}\n\
             - Strengths: {:?}\n\
             - Weaknesses: {:?}\n\
             - Feedback: {}\n\n\
             Provide a detailed, encouraging analysis suitable for a child.",
            question,
            if recent.title.is_empty() { "Untitled" } else { recent.title.as_str() },
            recent.overall_score,
            strengths,
            weaknesses,
            recent.feedback_student
        );
        let ai_content = self.gateway.invoke_prompt(&prompt).await?;

        Ok(AnalysisAnswer {
            tools_used,
            analysis_result: json!({
                "recent_writing": recent,
                "improvement_suggestions": details.map(|d| d.improvement_suggestions).unwrap_or_default(),
            }),
            ai_content,
        })
    }

    async fn learning_advice(&self, question: &str) -> AppResult<AnalysisAnswer> {
        let top_weakness = self.tools.get_top_weakness().await?;
        let practice_topics = analysis_tools::suggest_practice_topics(&top_weakness);
        let writing_prompt = analysis_tools::create_writing_prompt(
            practice_topics.first().copied().unwrap_or("creative writing"),
        );

        let prompt = format!(
            "Provide learning advice for this question: {}\n\n\
             Based on analysis:\n\
             - Main area to work on: {}\n\
             - Suggested practice topics: {:?}\n\
             - Writing prompt to try: {}\n\n\
             Give encouraging, specific advice suitable for a child, including the practice topics and writing prompt.",
            question, top_weakness, practice_topics, writing_prompt
        );
        let ai_content = self.gateway.invoke_prompt(&prompt).await?;

        Ok(AnalysisAnswer {
            tools_used: vec![GET_TOP_WEAKNESS, SUGGEST_PRACTICE_TOPICS, CREATE_WRITING_PROMPT],
            analysis_result: json!({
                "top_weakness": top_weakness,
                "practice_topics": practice_topics,
                "writing_prompt": writing_prompt,
            }),
            ai_content,
        })
    }

    async fn data_query(&self, question: &str) -> AppResult<AnalysisAnswer> {
        let lowered = question.to_lowercase();
        let mut results = Map::new();

        let (tools_used, writings) = if lowered.contains("date") || lowered.contains("when") {
            // 问题里的日期暂不解析，先按默认区间查询并提示用户给出日期范围
            let end = Utc::now();
            let start = end - Duration::days(DEFAULT_DATE_RANGE_DAYS);
            let writings = self.tools.search_writings_by_date(start, end).await?;
            results.insert(
                "message".to_string(),
                json!("Please specify the date range you'd like to search."),
            );
            results.insert(
                "date_range".to_string(),
                json!({"start": start, "end": end}),
            );
            (vec![SEARCH_WRITINGS_BY_DATE], writings)
        } else if lowered.contains("type") || lowered.contains("genre") {
            let recent = self.tools.get_recent_writings(20).await?;
            let genre = recent
                .iter()
                .map(|w| w.genre.as_str())
                .find(|g| !g.is_empty() && lowered.contains(&g.to_lowercase()))
                .map(str::to_string);
            match genre {
                Some(genre) => {
                    results.insert("genre".to_string(), json!(genre));
                    let writings = self.tools.search_writings_by_type(&genre).await?;
                    (vec![GET_RECENT_WRITINGS, SEARCH_WRITINGS_BY_TYPE], writings)
                }
                None => (vec![GET_RECENT_WRITINGS], recent),
            }
        } else {
            (vec![GET_RECENT_WRITINGS], self.tools.get_recent_writings(10).await?)
        };

        let prompt = format!(
            "Answer this data query about writings: {}\n\n\
             Available data: {} writings found\n\n\
             Provide a helpful summary of the data found.",
            question,
            writings.len()
        );
        results.insert("writings".to_string(), encode(&writings)?);
        let ai_content = self.gateway.invoke_prompt(&prompt).await?;

        Ok(AnalysisAnswer {
            tools_used,
            analysis_result: JsonValue::Object(results),
            ai_content,
        })
    }

    async fn general_response(&self, question: &str) -> AppResult<AnalysisAnswer> {
        let prompt = format!(
            "Please provide a helpful response to this question about writing: {}",
            question
        );
        let ai_content = self
            .gateway
            .invoke(&[ChatMessage::user(prompt)])
            .await?;

        Ok(AnalysisAnswer {
            tools_used: Vec::new(),
            analysis_result: json!({}),
            ai_content,
        })
    }
}

fn encode<T: serde::Serialize>(value: &T) -> AppResult<JsonValue> {
    serde_json::to_value(value).map_err(AppError::Encoding)
}

#[async_trait]
impl Pipeline for AnalysisWorkflow {
    type State = AnalysisWorkflowState;
    type Stage = AnalysisStage;
    type Update = AnalysisUpdate;

    fn name(&self) -> &'static str {
        "analysis"
    }

    fn stages(&self) -> &'static [AnalysisStage] {
        STAGES
    }

    async fn execute(
        &self,
        stage: AnalysisStage,
        state: &AnalysisWorkflowState,
    ) -> AppResult<AnalysisUpdate> {
        match stage {
            AnalysisStage::Classify => Ok(AnalysisUpdate::Classified(
                self.classify(&state.question).await?,
            )),
            AnalysisStage::Answer => Ok(AnalysisUpdate::Answered(self.answer(state).await?)),
        }
    }

    fn apply(&self, state: &mut AnalysisWorkflowState, update: AnalysisUpdate) {
        match update {
            AnalysisUpdate::Classified(analysis_type) => state.analysis_type = analysis_type,
            AnalysisUpdate::Answered(answer) => state.answer = Some(answer),
        }
    }
}
