//! Class table of the host API visible to snippets.

#[derive(Debug)]
pub struct ClassDef {
    pub name: &'static str,
    pub static_fields: &'static [&'static str],
    pub static_methods: &'static [&'static str],
    pub instance_methods: &'static [&'static str],
    pub constructible: bool,
}

impl ClassDef {
    pub fn simple_name(&self) -> &'static str {
        simple_name(self.name)
    }

    pub fn has_static_method(&self, method: &str) -> bool {
        self.static_methods.contains(&method)
    }

    pub fn has_static_field(&self, field: &str) -> bool {
        self.static_fields.contains(&field)
    }
}

/// Methods every value answers to.
pub const OBJECT_METHODS: &[&str] = &["toString", "equals", "hashCode"];

pub const AUTO_IMPORTED_PACKAGE: &str = "java.lang";

pub const CLASSES: &[ClassDef] = &[
    ClassDef {
        name: "java.lang.System",
        static_fields: &["out", "err"],
        static_methods: &[
            "currentTimeMillis",
            "nanoTime",
            "exit",
            "getProperty",
            "getenv",
            "lineSeparator",
        ],
        instance_methods: &[],
        constructible: false,
    },
    ClassDef {
        name: "java.io.PrintStream",
        static_fields: &[],
        static_methods: &[],
        instance_methods: &["println", "print"],
        constructible: false,
    },
    ClassDef {
        name: "java.lang.Math",
        static_fields: &[],
        static_methods: &["abs", "max", "min", "floorMod"],
        instance_methods: &[],
        constructible: false,
    },
    ClassDef {
        name: "java.lang.String",
        static_fields: &[],
        static_methods: &["valueOf"],
        instance_methods: &[
            "length",
            "isEmpty",
            "toUpperCase",
            "toLowerCase",
            "substring",
            "repeat",
            "contains",
            "charAt",
            "trim",
            "startsWith",
            "endsWith",
            "indexOf",
        ],
        constructible: false,
    },
    ClassDef {
        name: "java.lang.Integer",
        static_fields: &["MAX_VALUE", "MIN_VALUE"],
        static_methods: &["parseInt", "toString"],
        instance_methods: &[],
        constructible: false,
    },
    ClassDef {
        name: "java.lang.Boolean",
        static_fields: &[],
        static_methods: &["parseBoolean"],
        instance_methods: &[],
        constructible: false,
    },
    ClassDef {
        name: "java.lang.Thread",
        static_fields: &[],
        static_methods: &["sleep"],
        instance_methods: &[],
        constructible: false,
    },
    ClassDef {
        name: "java.lang.Runtime",
        static_fields: &[],
        static_methods: &["getRuntime"],
        instance_methods: &["availableProcessors", "exec"],
        constructible: false,
    },
    ClassDef {
        name: "java.io.File",
        static_fields: &[],
        static_methods: &[],
        instance_methods: &["exists", "getName", "getPath"],
        constructible: true,
    },
    ClassDef {
        name: "java.nio.file.Files",
        static_fields: &[],
        static_methods: &["exists", "readString"],
        instance_methods: &[],
        constructible: false,
    },
    ClassDef {
        name: "java.nio.file.Path",
        static_fields: &[],
        static_methods: &["of"],
        instance_methods: &["getFileName"],
        constructible: false,
    },
];

pub fn class(name: &str) -> Option<&'static ClassDef> {
    CLASSES.iter().find(|c| c.name == name)
}

pub fn has_package(package: &str) -> bool {
    CLASSES
        .iter()
        .any(|c| c.name.rsplit_once('.').is_some_and(|(pkg, _)| pkg == package))
}

pub fn simple_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, simple)| simple)
}
