mod name_tests;
