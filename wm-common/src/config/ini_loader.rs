use std::str::FromStr;

use configparser::ini::Ini;

pub struct IniLoader {
    pub ini: Ini,
}

impl IniLoader {
    pub fn new(config_file: &str) -> Self {
        let mut ini = Ini::new();
        // a missing file behaves like an empty one, defaults apply
        let _ = ini.load(config_file);
        Self { ini }
    }

    pub fn contains_section(&self, section: &str) -> bool {
        self.ini.sections().iter().any(|s| s == section)
    }

    pub fn get_optional<T>(&self, section: &str, key: &str) -> T
    where
        T: Default + FromStr,
    {
        self.get_with_default(section, key, T::default())
    }

    pub fn get_with_default<T>(&self, section: &str, key: &str, default: T) -> T
    where
        T: FromStr,
    {
        if let Some(value) = self.ini.get(section, key) {
            if !value.is_empty() {
                if let Ok(parsed) = value.parse::<T>() {
                    return parsed;
                }
            }
        }
        default
    }
}
