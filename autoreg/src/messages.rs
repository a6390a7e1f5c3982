//! Typed message catalog for operator-facing progress lines.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Every progress line the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    RegisterStart,
    Identity,
    PasswordGenerated,
    InvalidEmail,
    WaitingForCode,
    CodeStillWaiting,
    CodeReceived,
    CodeCancelled,
    CodeTimedOut,
    CodeInvalid,
    TokenFetching,
    TokenAttempt,
    TokenReadFailed,
    TokenMaxAttempts,
    TokenSuccess,
    AccountSaved,
    RegistrationFailed,
    PaymentStart,
    TrialButtonMissing,
    CardFormMissing,
    FieldMissing,
    FieldsFilled,
    PaymentSubmitted,
    PaymentSoftFailure,
    PaymentFailed,
    AwaitingHuman,
    HumanSessionEnded,
    Cooldown,
    Interrupted,
}

impl MessageKey {
    pub const ALL: [MessageKey; 29] = [
        MessageKey::RegisterStart,
        MessageKey::Identity,
        MessageKey::PasswordGenerated,
        MessageKey::InvalidEmail,
        MessageKey::WaitingForCode,
        MessageKey::CodeStillWaiting,
        MessageKey::CodeReceived,
        MessageKey::CodeCancelled,
        MessageKey::CodeTimedOut,
        MessageKey::CodeInvalid,
        MessageKey::TokenFetching,
        MessageKey::TokenAttempt,
        MessageKey::TokenReadFailed,
        MessageKey::TokenMaxAttempts,
        MessageKey::TokenSuccess,
        MessageKey::AccountSaved,
        MessageKey::RegistrationFailed,
        MessageKey::PaymentStart,
        MessageKey::TrialButtonMissing,
        MessageKey::CardFormMissing,
        MessageKey::FieldMissing,
        MessageKey::FieldsFilled,
        MessageKey::PaymentSubmitted,
        MessageKey::PaymentSoftFailure,
        MessageKey::PaymentFailed,
        MessageKey::AwaitingHuman,
        MessageKey::HumanSessionEnded,
        MessageKey::Cooldown,
        MessageKey::Interrupted,
    ];
}

/// Maps message keys to format templates with `{name}` placeholders.
pub trait MessageCatalog: Send + Sync {
    fn template(&self, key: MessageKey) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn catalog(&self) -> &'static dyn MessageCatalog {
        match self {
            Language::En => &English,
            Language::Zh => &SimplifiedChinese,
        }
    }
}

/// Resolve `key` through `catalog` and substitute `params`.
/// Placeholders with no matching parameter are left as written.
pub fn localize(
    catalog: &dyn MessageCatalog,
    key: MessageKey,
    params: &[(&str, &dyn Display)],
) -> String {
    let template = catalog.template(key);
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match params.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct English;

impl MessageCatalog for English {
    fn template(&self, key: MessageKey) -> &'static str {
        match key {
            MessageKey::RegisterStart => "🚀 Starting registration",
            MessageKey::Identity => "👤 {first_name} {last_name} <{email}>",
            MessageKey::PasswordGenerated => "🔑 Password generated ({length} characters)",
            MessageKey::InvalidEmail => "❌ Invalid email address: {email}",
            MessageKey::WaitingForCode => "📱 Waiting for verification code in {path}",
            MessageKey::CodeStillWaiting => {
                "ℹ️ Still waiting for verification code ({remaining}s remaining)"
            }
            MessageKey::CodeReceived => "✅ Verification code received",
            MessageKey::CodeCancelled => "ℹ️ Verification cancelled",
            MessageKey::CodeTimedOut => "❌ Timed out waiting for verification code ({timeout}s)",
            MessageKey::CodeInvalid => "❌ Invalid verification code: {content}",
            MessageKey::TokenFetching => "⏳ Fetching session token",
            MessageKey::TokenAttempt => "⏳ Attempt {attempt}: token not found, retrying in {wait}s",
            MessageKey::TokenReadFailed => "❌ Reading cookies failed: {error}",
            MessageKey::TokenMaxAttempts => "❌ Token not found after {max} attempts",
            MessageKey::TokenSuccess => "✅ Session token acquired",
            MessageKey::AccountSaved => "✅ Account saved for {email}",
            MessageKey::RegistrationFailed => "❌ Registration failed: {error}",
            MessageKey::PaymentStart => "ℹ️ Starting payment setup",
            MessageKey::TrialButtonMissing => "⚠️ Trial button not found",
            MessageKey::CardFormMissing => "⚠️ Card form did not load",
            MessageKey::FieldMissing => "❌ Required field missing: {field}",
            MessageKey::FieldsFilled => "✅ Card details filled ({branch} address)",
            MessageKey::PaymentSubmitted => "✅ Payment form submitted",
            MessageKey::PaymentSoftFailure => {
                "⚠️ Payment form partly filled, continuing: {error}"
            }
            MessageKey::PaymentFailed => "⚠️ Payment setup failed, registration kept: {error}",
            MessageKey::AwaitingHuman => {
                "ℹ️ Finish the payment form in the browser; the session stays open"
            }
            MessageKey::HumanSessionEnded => "ℹ️ Manual session ended: {reason}",
            MessageKey::Cooldown => "ℹ️ Waiting {seconds}s before closing the browser",
            MessageKey::Interrupted => "⚠️ Interrupted by operator",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifiedChinese;

impl MessageCatalog for SimplifiedChinese {
    fn template(&self, key: MessageKey) -> &'static str {
        match key {
            MessageKey::RegisterStart => "🚀 开始注册",
            MessageKey::Identity => "👤 {first_name} {last_name} <{email}>",
            MessageKey::PasswordGenerated => "🔑 已生成密码（{length} 位）",
            MessageKey::InvalidEmail => "❌ 无效的邮箱地址: {email}",
            MessageKey::WaitingForCode => "📱 等待验证码写入 {path}",
            MessageKey::CodeStillWaiting => "ℹ️ 仍在等待验证码... (剩余 {remaining} 秒)",
            MessageKey::CodeReceived => "✅ 收到验证码",
            MessageKey::CodeCancelled => "ℹ️ 已取消验证码输入",
            MessageKey::CodeTimedOut => "❌ 等待验证码超时 ({timeout}秒)",
            MessageKey::CodeInvalid => "❌ 无效的验证码格式: {content}",
            MessageKey::TokenFetching => "⏳ 获取令牌",
            MessageKey::TokenAttempt => "⏳ 第 {attempt} 次尝试，等待 {wait} 秒",
            MessageKey::TokenReadFailed => "❌ 读取 Cookie 失败: {error}",
            MessageKey::TokenMaxAttempts => "❌ 超过最大尝试次数 {max}",
            MessageKey::TokenSuccess => "✅ 令牌获取成功",
            MessageKey::AccountSaved => "✅ 已保存账户 {email}",
            MessageKey::RegistrationFailed => "❌ 注册失败: {error}",
            MessageKey::PaymentStart => "ℹ️ 开始银行卡绑定流程",
            MessageKey::TrialButtonMissing => "⚠️ 未找到试用按钮",
            MessageKey::CardFormMissing => "⚠️ 银行卡信息页面未正确加载",
            MessageKey::FieldMissing => "❌ 未找到必填字段: {field}",
            MessageKey::FieldsFilled => "✅ 银行卡信息填写完成（{branch}地址）",
            MessageKey::PaymentSubmitted => "✅ 银行卡信息已提交",
            MessageKey::PaymentSoftFailure => "⚠️ 填写过程中有错误，部分信息可能已填写: {error}",
            MessageKey::PaymentFailed => "⚠️ 银行卡绑定失败，但注册已完成: {error}",
            MessageKey::AwaitingHuman => "ℹ️ 请在浏览器中手动完成剩余信息，浏览器将保持打开",
            MessageKey::HumanSessionEnded => "ℹ️ 手动会话结束: {reason}",
            MessageKey::Cooldown => "ℹ️ 等待 {seconds} 秒后关闭浏览器",
            MessageKey::Interrupted => "⚠️ 用户中断",
        }
    }
}
