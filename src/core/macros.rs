//! 核心宏定义
//!
//! 提供统一的宏来减少配置类型的样板代码

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use dpsf::impl_default;
///
/// struct BurstSettings {
///     count: u32,
///     label: String,
/// }
///
/// impl_default!(BurstSettings {
///     count: 20,
///     label: String::new(),
/// });
///
/// assert_eq!(BurstSettings::default().count, 20);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

/// 同时实现Default和new()的宏
///
/// 使用示例:
/// ```rust
/// use dpsf::impl_default_and_new;
///
/// struct SplashSettings {
///     droplets: u32,
/// }
///
/// impl_default_and_new!(SplashSettings {
///     droplets: 10,
/// });
///
/// assert_eq!(SplashSettings::new().droplets, 10);
/// ```
#[macro_export]
macro_rules! impl_default_and_new {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }

        impl $struct_name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

#[cfg(test)]
mod tests {

    struct TestStruct {
        field1: u32,
        field2: String,
    }

    impl_default_and_new!(TestStruct {
        field1: 0,
        field2: String::new(),
    });

    #[test]
    fn test_impl_default_and_new() {
        let s1 = TestStruct::default();
        let s2 = TestStruct::new();

        assert_eq!(s1.field1, 0);
        assert_eq!(s1.field2, "");
        assert_eq!(s2.field1, 0);
        assert_eq!(s2.field2, "");
    }
}
