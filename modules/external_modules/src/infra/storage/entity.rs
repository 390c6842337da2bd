//! SeaORM entities for database tables

/// Registered modules table entity
pub mod module {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "external_modules")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub external_module_id: i64,

        /// Module directory prefix
        #[sea_orm(unique)]
        pub directory_prefix: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::setting::Entity")]
        Settings,
    }

    impl Related<super::setting::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Settings.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Module settings table entity
pub mod setting {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "external_module_settings")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,

        pub external_module_id: i64,

        /// `None` for system (global) settings
        pub project_id: Option<i64>,

        /// Fully prefixed setting key
        pub key: String,

        /// Type tag of the stored JSON value
        pub value_type: String,

        /// Value serialized as JSON text
        #[sea_orm(column_type = "Text")]
        pub value: String,

        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::module::Entity",
            from = "Column::ExternalModuleId",
            to = "super::module::Column::ExternalModuleId"
        )]
        Module,
    }

    impl Related<super::module::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Module.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Core log table entity
pub mod log {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "external_modules_log")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub log_id: i64,

        pub timestamp: DateTimeUtc,

        /// Acting user, `None` when anonymous or unknown
        pub ui_id: Option<i64>,

        /// Client address (may list several proxy hops)
        #[sea_orm(column_type = "Text", nullable)]
        pub ip: Option<String>,

        pub external_module_id: i64,

        pub project_id: Option<i64>,

        pub record: Option<String>,

        #[sea_orm(column_type = "Text")]
        pub message: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::log_parameter::Entity")]
        Parameters,
    }

    impl Related<super::log_parameter::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Parameters.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Log side-parameter table entity
pub mod log_parameter {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "external_modules_log_parameters")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub log_id: i64,

        #[sea_orm(primary_key, auto_increment = false)]
        pub name: String,

        #[sea_orm(column_type = "Text")]
        pub value: String,

        /// JSON type of the logged value (`integer`, `float`, `boolean`, `string`)
        pub value_type: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::log::Entity",
            from = "Column::LogId",
            to = "super::log::Column::LogId",
            on_delete = "Cascade"
        )]
        Log,
    }

    impl Related<super::log::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Log.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// User accounts table entity
pub mod user {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "user_information")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub ui_id: i64,

        #[sea_orm(unique)]
        pub username: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Record id ledger used by auto-numbering
pub mod project_record {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "project_records")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,

        pub project_id: i64,

        pub record_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
