//! Prompt construction for structured invoice extraction

use std::fmt::Write as _;

use crate::types::{ExtractionRecord, NOT_AVAILABLE};

/// Default system message sent with every completion
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an invoice data extraction assistant. \
Extract the key fields from the invoice text supplied by the user and answer with a single JSON object.";

/// Expense categories the model chooses from for the `类别` field
pub const CATEGORIES: [&str; 13] = [
    "餐饮服务",
    "住宿服务",
    "交通运输服务",
    "居民日常服务",
    "办公用品",
    "电子设备",
    "咨询服务",
    "技术服务",
    "租赁服务",
    "建筑服务",
    "医疗服务",
    "教育服务",
    "商品零售",
];

const FIELD_HINTS: [&str; 15] = [
    "invoice_code",
    "invoice_number",
    "seller_tax_id",
    "seller_name",
    "buyer_tax_id",
    "buyer_name",
    "issue_date",
    "item_name",
    "quantity",
    "amount",
    "tax_rate",
    "tax_amount",
    "total_amount",
    "invoice_type",
    "category",
];

const EXAMPLE_RECORD: &str = r#"{
    "发票代码": "044002301111",
    "发票号码": "45311111",
    "销方识别号": "9144000061740323XQ",
    "销方名称": "Example Catering Co., Ltd.",
    "购方识别号": "91111111MA9W511111",
    "购买方名称": "Example Technology Co., Ltd.",
    "开票日期": "2024年12月30日",
    "项目名称": "*餐饮服务*餐饮服务",
    "数量": "1",
    "金额": "177.28",
    "税率": "6%",
    "税额": "10.64",
    "价税合计": "187.92",
    "发票票种": "增值税电子普通发票",
    "类别": "餐饮服务"
}"#;

/// Builds the system and user prompts for one document
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    system_prompt: String,
    buyer_hint: Option<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PromptBuilder {
    /// Create a builder with the default system prompt
    ///
    /// `buyer_hint` is appended to every user prompt to help the model tell buyer
    /// and seller apart.
    pub fn new(buyer_hint: Option<String>) -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            buyer_hint,
        }
    }

    /// Replace the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// System message for every completion
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// User message for a document whose extracted text is `content`
    pub fn user_prompt(&self, content: &str) -> String {
        let mut prompt = String::with_capacity(content.len() + 2048);

        prompt.push_str(
            "Extract structured invoice information from the document text below. \
             The invoice type is usually \"增值税电子普通发票\" or \"电子发票（普通发票）\".\n\n",
        );
        prompt.push_str("Document text:\n---\n");
        prompt.push_str(content);
        prompt.push_str("\n---\n\n");

        let _ = writeln!(
            prompt,
            "Answer strictly with the JSON object below. Use \"{}\" for any field that is not present in the document.",
            NOT_AVAILABLE
        );
        prompt.push_str("{\n");
        let last = ExtractionRecord::FIELD_NAMES.len() - 1;
        for (i, (name, hint)) in ExtractionRecord::FIELD_NAMES
            .iter()
            .zip(FIELD_HINTS)
            .enumerate()
        {
            let separator = if i == last { "" } else { "," };
            let _ = writeln!(prompt, "    \"{name}\": \"{hint}\"{separator}");
        }
        prompt.push_str("}\n\n");

        prompt.push_str("Example:\n");
        prompt.push_str(EXAMPLE_RECORD);
        prompt.push_str("\n\n");

        if let Some(hint) = &self.buyer_hint {
            prompt.push_str(hint);
            prompt.push_str("\n\n");
        }

        let _ = writeln!(
            prompt,
            "Category reference: {} and similar.",
            CATEGORIES.join(",")
        );
        prompt.push_str("Do not include currency symbols such as ¥ in amounts.\n");
        prompt.push_str("Do not swap the seller and buyer information.\n");

        prompt
    }
}
