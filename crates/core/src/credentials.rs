//! 认证凭据存储
//!
//! 为外层Web/API适配器保存的两个独立映射：用户名到密码（cookie登录）、
//! API key到描述。核心只做线程安全的存取，不做哈希与过期处理，更强的
//! 安全策略由外层负责。

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct CredentialStore {
    web_passwords: RwLock<HashMap<String, String>>,
    api_keys: RwLock<HashMap<String, String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_web_user(&self, username: impl Into<String>, password: impl Into<String>) {
        let mut users = self.web_passwords.write().unwrap_or_else(|e| e.into_inner());
        users.insert(username.into(), password.into());
    }

    pub fn lookup_password(&self, username: &str) -> Option<String> {
        let users = self.web_passwords.read().unwrap_or_else(|e| e.into_inner());
        users.get(username).cloned()
    }

    pub fn add_api_key(&self, key: impl Into<String>, description: impl Into<String>) {
        let mut keys = self.api_keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(key.into(), description.into());
    }

    pub fn lookup_api_key(&self, key: &str) -> Option<String> {
        let keys = self.api_keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(key).cloned()
    }
}
